//! Function storage interface.
//!
//! Functions are a separate capability. Neither bundled store persists them;
//! both answer every call with `StorageError::Unimplemented`.

use async_trait::async_trait;

use super::service_store::Result;
use crate::model::Function;

#[async_trait]
pub trait FunctionStore: Send + Sync {
    async fn create_function(&self, function: Function) -> Result<Function>;

    async fn delete_function(&self, name: &str) -> Result<()>;

    async fn delete_functions(&self) -> Result<()>;

    async fn get_function(&self, name: &str) -> Result<Function>;

    async fn list_all_functions(&self, filter: &str) -> Result<Vec<Function>>;

    async fn get_function_count(&self) -> Result<i64>;
}
