//! Policy and role policy storage interfaces.
//!
//! Both collections live inside the owning service's row. Every operation is
//! addressed by service name; sub-document operations add the document id.

use std::collections::HashMap;

use async_trait::async_trait;

use super::service_store::Result;
use crate::model::{Policy, PolicyAndRolePolicyCount, RolePolicy};

/// Interface for a service's access policies.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Append a policy. The returned copy carries the generated id; any id
    /// supplied by the caller is replaced.
    async fn create_policy(&self, service: &str, policy: Policy) -> Result<Policy>;

    async fn get_policy(&self, service: &str, id: &str) -> Result<Policy>;

    /// Remove exactly one policy, keeping the order of the rest.
    async fn delete_policy(&self, service: &str, id: &str) -> Result<()>;

    async fn delete_policies(&self, service: &str) -> Result<()>;

    /// All policies in insertion order.
    ///
    /// `filter` is accepted for interface compatibility and currently ignored.
    async fn list_all_policies(&self, service: &str, filter: &str) -> Result<Vec<Policy>>;

    /// Policy count for one service, or across all services when `service`
    /// is empty.
    async fn get_policy_count(&self, service: &str) -> Result<i64>;

    /// Both collection sizes for every service, read in one pass.
    async fn get_policy_and_role_policy_counts(
        &self,
    ) -> Result<HashMap<String, PolicyAndRolePolicyCount>>;
}

/// Interface for a service's role policies.
#[async_trait]
pub trait RolePolicyStore: Send + Sync {
    async fn create_role_policy(&self, service: &str, policy: RolePolicy) -> Result<RolePolicy>;

    async fn get_role_policy(&self, service: &str, id: &str) -> Result<RolePolicy>;

    async fn delete_role_policy(&self, service: &str, id: &str) -> Result<()>;

    async fn delete_role_policies(&self, service: &str) -> Result<()>;

    async fn list_all_role_policies(
        &self,
        service: &str,
        filter: &str,
    ) -> Result<Vec<RolePolicy>>;

    async fn get_role_policy_count(&self, service: &str) -> Result<i64>;
}
