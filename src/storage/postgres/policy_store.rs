//! PostgreSQL implementations of PolicyStore and RolePolicyStore.
//!
//! Thin bindings of [`JsonArrayStore`](super::JsonArrayStore) to the
//! `policies` and `role_policies` columns.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;

use super::PostgresStore;
use crate::interfaces::{PolicyStore, Result, RolePolicyStore, StorageError};
use crate::model::{Policy, PolicyAndRolePolicyCount, RolePolicy, SubDocument};

#[async_trait]
impl PolicyStore for PostgresStore {
    async fn create_policy(&self, service: &str, policy: Policy) -> Result<Policy> {
        self.policies.create(service, policy).await
    }

    async fn get_policy(&self, service: &str, id: &str) -> Result<Policy> {
        self.policies.get(service, id).await
    }

    async fn delete_policy(&self, service: &str, id: &str) -> Result<()> {
        self.policies.delete(service, id).await
    }

    async fn delete_policies(&self, service: &str) -> Result<()> {
        self.policies.delete_all(service).await
    }

    async fn list_all_policies(&self, service: &str, filter: &str) -> Result<Vec<Policy>> {
        self.policies.list(service, filter).await
    }

    async fn get_policy_count(&self, service: &str) -> Result<i64> {
        self.policies.count(service).await
    }

    async fn get_policy_and_role_policy_counts(
        &self,
    ) -> Result<HashMap<String, PolicyAndRolePolicyCount>> {
        let sql = format!(
            "SELECT name,
                CASE WHEN jsonb_typeof(policies) = 'array'
                    THEN jsonb_array_length(policies) END::bigint AS policy_count,
                CASE WHEN jsonb_typeof(role_policies) = 'array'
                    THEN jsonb_array_length(role_policies) END::bigint AS role_policy_count
            FROM {}",
            self.tables.services_quoted()
        );

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name")?;
            let policy_count: Option<i64> = row.try_get("policy_count")?;
            let role_policy_count: Option<i64> = row.try_get("role_policy_count")?;

            // NULL marks a column that is not an array.
            let policy_count =
                policy_count.ok_or_else(|| not_an_array(&name, Policy::COLUMN))?;
            let role_policy_count =
                role_policy_count.ok_or_else(|| not_an_array(&name, RolePolicy::COLUMN))?;

            counts.insert(
                name,
                PolicyAndRolePolicyCount {
                    policy_count,
                    role_policy_count,
                },
            );
        }
        Ok(counts)
    }
}

#[async_trait]
impl RolePolicyStore for PostgresStore {
    async fn create_role_policy(&self, service: &str, policy: RolePolicy) -> Result<RolePolicy> {
        self.role_policies.create(service, policy).await
    }

    async fn get_role_policy(&self, service: &str, id: &str) -> Result<RolePolicy> {
        self.role_policies.get(service, id).await
    }

    async fn delete_role_policy(&self, service: &str, id: &str) -> Result<()> {
        self.role_policies.delete(service, id).await
    }

    async fn delete_role_policies(&self, service: &str) -> Result<()> {
        self.role_policies.delete_all(service).await
    }

    async fn list_all_role_policies(
        &self,
        service: &str,
        filter: &str,
    ) -> Result<Vec<RolePolicy>> {
        self.role_policies.list(service, filter).await
    }

    async fn get_role_policy_count(&self, service: &str) -> Result<i64> {
        self.role_policies.count(service).await
    }
}

fn not_an_array(service: &str, column: &'static str) -> StorageError {
    StorageError::CorruptData {
        service: service.to_string(),
        column,
        reason: "expected array".to_string(),
    }
}
