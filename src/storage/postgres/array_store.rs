//! Id-addressed CRUD over a JSONB array column.
//!
//! Every element of the array is a [`SubDocument`] with a generated `id`.
//! Each operation is a single statement against the parent row, so it runs
//! under that row's lock and needs no transaction of its own.

use std::marker::PhantomData;

use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::interfaces::{Result, StorageError};
use crate::model::{new_document_id, SubDocument};
use crate::storage::schema::{quote_ident, TableNames};

/// SQLSTATE raised by the JSONB functions when a column is not an array.
const INVALID_PARAMETER_VALUE: &str = "22023";

/// JSONB array column of the services table, keyed by service name.
pub struct JsonArrayStore<T: SubDocument> {
    pool: PgPool,
    table: String,
    column: String,
    _marker: PhantomData<T>,
}

impl<T: SubDocument> JsonArrayStore<T> {
    /// Store for `T::COLUMN` of the services table.
    pub fn new(pool: PgPool, tables: &TableNames) -> Self {
        Self::for_column(pool, tables, T::COLUMN)
    }

    /// Store for an arbitrary array column of the services table.
    pub fn for_column(pool: PgPool, tables: &TableNames, column: &str) -> Self {
        Self {
            pool,
            table: tables.services_quoted(),
            column: quote_ident(column),
            _marker: PhantomData,
        }
    }

    /// Append `document` with a fresh id.
    ///
    /// Only an array column is appended to; anything else is reported as
    /// corrupt rather than wrapped into a new array.
    pub async fn create(&self, service: &str, mut document: T) -> Result<T> {
        document.set_id(new_document_id());
        let value = serde_json::to_value(&document).map_err(StorageError::Encoding)?;

        let sql = format!(
            "UPDATE {table} SET {col} = {col} || jsonb_build_array($1::jsonb)
            WHERE name = $2 AND jsonb_typeof({col}) = 'array'",
            table = self.table,
            col = self.column
        );

        let result = sqlx::query(&sql)
            .bind(value)
            .bind(service)
            .execute(&self.pool)
            .await
            .map_err(|e| self.classify(service, e))?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_corrupt(service).await);
        }

        debug!(service, kind = T::KIND, id = document.id(), "Sub-document created");
        Ok(document)
    }

    /// Element whose `id` equals `id`.
    pub async fn get(&self, service: &str, id: &str) -> Result<T> {
        let sql = format!(
            "SELECT arr.item
            FROM {table} s, jsonb_array_elements(s.{col}) AS arr(item)
            WHERE s.name = $1 AND arr.item->>'id' = $2
            LIMIT 1",
            table = self.table,
            col = self.column
        );

        let row = sqlx::query(&sql)
            .bind(service)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(service, e))?
            .ok_or_else(|| self.not_found(service, id))?;

        let item: Value = row.try_get("item")?;
        self.decode(service, item)
    }

    /// Remove the element whose `id` equals `id`.
    ///
    /// The element's position is resolved from the row being updated, inside
    /// the same statement, so a concurrent append or delete on the same
    /// service cannot shift it between lookup and removal.
    pub async fn delete(&self, service: &str, id: &str) -> Result<()> {
        let sql = format!(
            "UPDATE {table} SET {col} = {col} - (
                SELECT (arr.position - 1)::int
                FROM jsonb_array_elements({table}.{col}) WITH ORDINALITY AS arr(item, position)
                WHERE arr.item->>'id' = $2
                LIMIT 1
            )
            WHERE name = $1
            AND EXISTS (
                SELECT 1 FROM jsonb_array_elements({table}.{col}) AS e(item)
                WHERE e.item->>'id' = $2
            )",
            table = self.table,
            col = self.column
        );

        let result = sqlx::query(&sql)
            .bind(service)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| self.classify(service, e))?;

        if result.rows_affected() == 0 {
            return Err(self.not_found(service, id));
        }

        debug!(service, kind = T::KIND, id, "Sub-document deleted");
        Ok(())
    }

    /// Replace the array with an empty one. A corrupt column is left as is.
    pub async fn delete_all(&self, service: &str) -> Result<()> {
        let sql = format!(
            "UPDATE {table} SET {col} = '[]'::jsonb
            WHERE name = $1 AND jsonb_typeof({col}) = 'array'",
            table = self.table,
            col = self.column
        );

        let result = sqlx::query(&sql).bind(service).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_corrupt(service).await);
        }
        Ok(())
    }

    /// Whole array in stored order.
    pub async fn list(&self, service: &str, _filter: &str) -> Result<Vec<T>> {
        let sql = format!(
            "SELECT {col} AS items FROM {table} WHERE name = $1",
            table = self.table,
            col = self.column
        );

        let row = sqlx::query(&sql)
            .bind(service)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::service_not_found(service))?;

        let items: Value = row.try_get("items")?;
        match items {
            Value::Array(_) => self.decode(service, items),
            other => Err(self.corrupt(service, format!("expected array, found {}", other))),
        }
    }

    /// Array length for `service`, or the sum over all services when
    /// `service` is empty.
    pub async fn count(&self, service: &str) -> Result<i64> {
        if service.is_empty() {
            let sql = format!(
                "SELECT COALESCE(SUM(jsonb_array_length({col})), 0)::bigint AS ct FROM {table}",
                table = self.table,
                col = self.column
            );
            let row = sqlx::query(&sql)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| self.classify("*", e))?;
            return Ok(row.try_get("ct")?);
        }

        let sql = format!(
            "SELECT COALESCE(jsonb_array_length({col}), 0)::bigint AS ct FROM {table} WHERE name = $1",
            table = self.table,
            col = self.column
        );
        let row = sqlx::query(&sql)
            .bind(service)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(service, e))?
            .ok_or_else(|| StorageError::service_not_found(service))?;

        Ok(row.try_get("ct")?)
    }

    /// Explain why a guarded update touched no row: either the service does
    /// not exist or its column is not an array.
    async fn missing_or_corrupt(&self, service: &str) -> StorageError {
        let sql = format!(
            "SELECT jsonb_typeof({col}) AS kind FROM {table} WHERE name = $1",
            table = self.table,
            col = self.column
        );

        let row = match sqlx::query(&sql)
            .bind(service)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(row)) => row,
            Ok(None) => return StorageError::service_not_found(service),
            Err(e) => return e.into(),
        };

        match row.try_get::<String, _>("kind") {
            Ok(kind) => self.corrupt(service, format!("expected array, found {}", kind)),
            Err(e) => e.into(),
        }
    }

    fn decode<D: serde::de::DeserializeOwned>(&self, service: &str, value: Value) -> Result<D> {
        serde_json::from_value(value).map_err(|e| self.corrupt(service, e.to_string()))
    }

    fn not_found(&self, service: &str, id: &str) -> StorageError {
        StorageError::NotFound {
            entity: T::KIND,
            key: format!("{}/{}", service, id),
        }
    }

    fn corrupt(&self, service: &str, reason: String) -> StorageError {
        StorageError::CorruptData {
            service: service.to_string(),
            column: T::COLUMN,
            reason,
        }
    }

    /// JSONB functions reject a non-array column with SQLSTATE 22023.
    fn classify(&self, service: &str, err: sqlx::Error) -> StorageError {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(INVALID_PARAMETER_VALUE) {
                return self.corrupt(service, db.message().to_string());
            }
        }
        err.into()
    }
}
