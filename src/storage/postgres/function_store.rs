//! Function storage is not provided by the PostgreSQL store.

use async_trait::async_trait;
use tracing::warn;

use super::PostgresStore;
use crate::interfaces::{FunctionStore, Result, StorageError};
use crate::model::Function;

const UNIMPLEMENTED: StorageError = StorageError::Unimplemented("function storage");

#[async_trait]
impl FunctionStore for PostgresStore {
    async fn create_function(&self, function: Function) -> Result<Function> {
        warn!(function = %function.name, "create_function is not implemented");
        Err(UNIMPLEMENTED)
    }

    async fn delete_function(&self, name: &str) -> Result<()> {
        warn!(function = %name, "delete_function is not implemented");
        Err(UNIMPLEMENTED)
    }

    async fn delete_functions(&self) -> Result<()> {
        warn!("delete_functions is not implemented");
        Err(UNIMPLEMENTED)
    }

    async fn get_function(&self, name: &str) -> Result<Function> {
        warn!(function = %name, "get_function is not implemented");
        Err(UNIMPLEMENTED)
    }

    async fn list_all_functions(&self, _filter: &str) -> Result<Vec<Function>> {
        warn!("list_all_functions is not implemented");
        Err(UNIMPLEMENTED)
    }

    async fn get_function_count(&self) -> Result<i64> {
        warn!("get_function_count is not implemented");
        Err(UNIMPLEMENTED)
    }
}
