//! Mock storage implementation for testing.
//!
//! Keeps services in memory and reproduces the PostgreSQL store's error
//! semantics, so code written against the store traits can be tested without
//! a database.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::interfaces::{
    FunctionStore, PolicyStore, Result, RolePolicyStore, ServiceStore, StorageError,
};
use crate::model::{
    new_document_id, Function, Policy, PolicyAndRolePolicyCount, RolePolicy, Service,
    SubDocument,
};

/// Mock policy store that keeps services in memory.
#[derive(Default)]
pub struct MockPolicyStore {
    services: RwLock<BTreeMap<String, Service>>,
}

impl MockPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_document<T: SubDocument>(&self, service: &str, mut document: T) -> Result<T> {
        let mut services = self.services.write().await;
        let parent = services
            .get_mut(service)
            .ok_or_else(|| StorageError::service_not_found(service))?;

        document.set_id(new_document_id());
        T::collection_mut(parent).push(document.clone());
        Ok(document)
    }

    async fn get_document<T: SubDocument>(&self, service: &str, id: &str) -> Result<T> {
        let services = self.services.read().await;
        services
            .get(service)
            .and_then(|parent| T::collection(parent).iter().find(|d| d.id() == id))
            .cloned()
            .ok_or_else(|| not_found::<T>(service, id))
    }

    async fn delete_document<T: SubDocument>(&self, service: &str, id: &str) -> Result<()> {
        let mut services = self.services.write().await;
        let collection = services
            .get_mut(service)
            .map(T::collection_mut)
            .ok_or_else(|| not_found::<T>(service, id))?;

        let position = collection
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| not_found::<T>(service, id))?;
        collection.remove(position);
        Ok(())
    }

    async fn delete_documents<T: SubDocument>(&self, service: &str) -> Result<()> {
        let mut services = self.services.write().await;
        let parent = services
            .get_mut(service)
            .ok_or_else(|| StorageError::service_not_found(service))?;
        T::collection_mut(parent).clear();
        Ok(())
    }

    async fn list_documents<T: SubDocument>(&self, service: &str) -> Result<Vec<T>> {
        let services = self.services.read().await;
        services
            .get(service)
            .map(|parent| T::collection(parent).clone())
            .ok_or_else(|| StorageError::service_not_found(service))
    }

    async fn count_documents<T: SubDocument>(&self, service: &str) -> Result<i64> {
        let services = self.services.read().await;
        if service.is_empty() {
            return Ok(services
                .values()
                .map(|parent| T::collection(parent).len() as i64)
                .sum());
        }

        services
            .get(service)
            .map(|parent| T::collection(parent).len() as i64)
            .ok_or_else(|| StorageError::service_not_found(service))
    }
}

fn not_found<T: SubDocument>(service: &str, id: &str) -> StorageError {
    StorageError::NotFound {
        entity: T::KIND,
        key: format!("{}/{}", service, id),
    }
}

#[async_trait]
impl ServiceStore for MockPolicyStore {
    async fn create_service(&self, service: Service) -> Result<()> {
        let mut services = self.services.write().await;
        if services.contains_key(&service.name) {
            return Err(StorageError::AlreadyExists { name: service.name });
        }
        services.insert(service.name.clone(), service);
        Ok(())
    }

    async fn get_service(&self, name: &str) -> Result<Service> {
        self.services
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::service_not_found(name))
    }

    async fn delete_service(&self, name: &str) -> Result<()> {
        self.services
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::service_not_found(name))
    }

    async fn delete_services(&self) -> Result<()> {
        let mut services = self.services.write().await;
        if services.is_empty() {
            info!("No services to delete");
        }
        services.clear();
        Ok(())
    }

    async fn list_all_services(&self) -> Result<Vec<Service>> {
        Ok(self.services.read().await.values().cloned().collect())
    }

    async fn get_service_count(&self) -> Result<i64> {
        Ok(self.services.read().await.len() as i64)
    }

    async fn get_service_names(&self) -> Result<Vec<String>> {
        Ok(self.services.read().await.keys().cloned().collect())
    }
}

#[async_trait]
impl PolicyStore for MockPolicyStore {
    async fn create_policy(&self, service: &str, policy: Policy) -> Result<Policy> {
        self.create_document(service, policy).await
    }

    async fn get_policy(&self, service: &str, id: &str) -> Result<Policy> {
        self.get_document(service, id).await
    }

    async fn delete_policy(&self, service: &str, id: &str) -> Result<()> {
        self.delete_document::<Policy>(service, id).await
    }

    async fn delete_policies(&self, service: &str) -> Result<()> {
        self.delete_documents::<Policy>(service).await
    }

    async fn list_all_policies(&self, service: &str, _filter: &str) -> Result<Vec<Policy>> {
        self.list_documents(service).await
    }

    async fn get_policy_count(&self, service: &str) -> Result<i64> {
        self.count_documents::<Policy>(service).await
    }

    async fn get_policy_and_role_policy_counts(
        &self,
    ) -> Result<HashMap<String, PolicyAndRolePolicyCount>> {
        let services = self.services.read().await;
        Ok(services
            .values()
            .map(|s| {
                (
                    s.name.clone(),
                    PolicyAndRolePolicyCount {
                        policy_count: s.policies.len() as i64,
                        role_policy_count: s.role_policies.len() as i64,
                    },
                )
            })
            .collect())
    }
}

#[async_trait]
impl RolePolicyStore for MockPolicyStore {
    async fn create_role_policy(&self, service: &str, policy: RolePolicy) -> Result<RolePolicy> {
        self.create_document(service, policy).await
    }

    async fn get_role_policy(&self, service: &str, id: &str) -> Result<RolePolicy> {
        self.get_document(service, id).await
    }

    async fn delete_role_policy(&self, service: &str, id: &str) -> Result<()> {
        self.delete_document::<RolePolicy>(service, id).await
    }

    async fn delete_role_policies(&self, service: &str) -> Result<()> {
        self.delete_documents::<RolePolicy>(service).await
    }

    async fn list_all_role_policies(
        &self,
        service: &str,
        _filter: &str,
    ) -> Result<Vec<RolePolicy>> {
        self.list_documents(service).await
    }

    async fn get_role_policy_count(&self, service: &str) -> Result<i64> {
        self.count_documents::<RolePolicy>(service).await
    }
}

#[async_trait]
impl FunctionStore for MockPolicyStore {
    async fn create_function(&self, function: Function) -> Result<Function> {
        warn!(function = %function.name, "create_function is not implemented");
        Err(StorageError::Unimplemented("function storage"))
    }

    async fn delete_function(&self, name: &str) -> Result<()> {
        warn!(function = %name, "delete_function is not implemented");
        Err(StorageError::Unimplemented("function storage"))
    }

    async fn delete_functions(&self) -> Result<()> {
        warn!("delete_functions is not implemented");
        Err(StorageError::Unimplemented("function storage"))
    }

    async fn get_function(&self, name: &str) -> Result<Function> {
        warn!(function = %name, "get_function is not implemented");
        Err(StorageError::Unimplemented("function storage"))
    }

    async fn list_all_functions(&self, _filter: &str) -> Result<Vec<Function>> {
        warn!("list_all_functions is not implemented");
        Err(StorageError::Unimplemented("function storage"))
    }

    async fn get_function_count(&self) -> Result<i64> {
        warn!("get_function_count is not implemented");
        Err(StorageError::Unimplemented("function storage"))
    }
}
