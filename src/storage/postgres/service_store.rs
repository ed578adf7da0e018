//! PostgreSQL implementation of ServiceStore.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sea_query::{Alias, Expr, Func, Order, PostgresQueryBuilder, Query, SimpleExpr};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{debug, info};

use super::PostgresStore;
use crate::interfaces::{Result, ServiceStore, StorageError};
use crate::model::{Policy, RolePolicy, Service};
use crate::storage::schema::Services;

/// `CAST('<json>' AS jsonb)` for a serializable value.
fn jsonb<T: serde::Serialize>(value: &T) -> Result<SimpleExpr> {
    let text = serde_json::to_string(value).map_err(StorageError::Encoding)?;
    Ok(Func::cast_as(text, Alias::new("jsonb")).into())
}

/// Decode a JSONB column, rejecting anything that is not an array.
fn decode_array<T: serde::de::DeserializeOwned>(
    name: &str,
    column: &'static str,
    value: Value,
) -> Result<Vec<T>> {
    let corrupt = |reason: String| StorageError::CorruptData {
        service: name.to_string(),
        column,
        reason,
    };

    match value {
        Value::Array(_) => serde_json::from_value(value).map_err(|e| corrupt(e.to_string())),
        other => Err(corrupt(format!("expected array, found {}", other))),
    }
}

fn service_from_row(row: &PgRow) -> Result<Service> {
    let name: String = row.try_get("name")?;
    let service_type: String = row.try_get("type")?;
    let policies: Vec<Policy> = decode_array(&name, "policies", row.try_get("policies")?)?;
    let role_policies: Vec<RolePolicy> =
        decode_array(&name, "role_policies", row.try_get("role_policies")?)?;

    let metadata: BTreeMap<String, String> = match row.try_get::<Value, _>("metadata")? {
        Value::Null => BTreeMap::new(),
        value => serde_json::from_value(value).map_err(|e| StorageError::CorruptData {
            service: name.clone(),
            column: "metadata",
            reason: e.to_string(),
        })?,
    };

    Ok(Service {
        name,
        service_type,
        policies,
        role_policies,
        metadata,
    })
}

impl PostgresStore {
    fn select_services(&self) -> sea_query::SelectStatement {
        Query::select()
            .columns([
                Services::Name,
                Services::Type,
                Services::Policies,
                Services::RolePolicies,
                Services::Metadata,
            ])
            .from(self.tables.services_table())
            .to_owned()
    }
}

#[async_trait]
impl ServiceStore for PostgresStore {
    async fn create_service(&self, service: Service) -> Result<()> {
        let query = Query::insert()
            .into_table(self.tables.services_table())
            .columns([
                Services::Name,
                Services::Type,
                Services::Policies,
                Services::RolePolicies,
                Services::Metadata,
            ])
            .values_panic([
                service.name.as_str().into(),
                service.service_type.as_str().into(),
                jsonb(&service.policies)?,
                jsonb(&service.role_policies)?,
                jsonb(&service.metadata)?,
            ])
            .to_string(PostgresQueryBuilder);

        match sqlx::query(&query).execute(&self.pool).await {
            Ok(_) => {
                debug!(service = %service.name, "Service created");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::AlreadyExists { name: service.name })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_service(&self, name: &str) -> Result<Service> {
        let query = self
            .select_services()
            .and_where(Expr::col(Services::Name).eq(name))
            .to_string(PostgresQueryBuilder);

        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::service_not_found(name))?;

        service_from_row(&row)
    }

    async fn delete_service(&self, name: &str) -> Result<()> {
        let query = Query::delete()
            .from_table(self.tables.services_table())
            .and_where(Expr::col(Services::Name).eq(name))
            .to_string(PostgresQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::service_not_found(name));
        }

        debug!(service = %name, "Service deleted");
        Ok(())
    }

    async fn delete_services(&self) -> Result<()> {
        let query = Query::delete()
            .from_table(self.tables.services_table())
            .to_string(PostgresQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            info!("No services to delete");
        }
        Ok(())
    }

    async fn list_all_services(&self) -> Result<Vec<Service>> {
        let query = self
            .select_services()
            .order_by(Services::Name, Order::Asc)
            .to_string(PostgresQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(service_from_row).collect()
    }

    async fn get_service_count(&self) -> Result<i64> {
        let query = Query::select()
            .expr(Expr::col(Services::Name).count())
            .from(self.tables.services_table())
            .to_string(PostgresQueryBuilder);

        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        Ok(row.try_get(0)?)
    }

    async fn get_service_names(&self) -> Result<Vec<String>> {
        let query = Query::select()
            .column(Services::Name)
            .from(self.tables.services_table())
            .order_by(Services::Name, Order::Asc)
            .to_string(PostgresQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let names = rows
            .iter()
            .map(|r| r.try_get("name"))
            .collect::<std::result::Result<Vec<String>, sqlx::Error>>()?;
        Ok(names)
    }
}
