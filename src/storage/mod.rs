//! Storage implementations.

pub mod mock;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod schema;

pub use crate::interfaces::{
    FunctionStore, PolicyStore, Result, RolePolicyStore, ServiceStore, StorageError,
};
pub use mock::MockPolicyStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

#[cfg(feature = "postgres")]
use std::sync::Arc;

#[cfg(feature = "postgres")]
use tracing::info;

#[cfg(feature = "postgres")]
use crate::config::{StorageConfig, WatcherConfig};

/// Initialize storage based on configuration.
///
/// Connects to PostgreSQL and, when `init_schema` is set, creates the
/// services table and the change trigger publishing on the watcher channel.
#[cfg(feature = "postgres")]
pub async fn init_storage(
    config: &StorageConfig,
    watcher: &WatcherConfig,
) -> Result<Arc<PostgresStore>> {
    info!(
        table_prefix = %config.postgres.table_prefix,
        "Storage: postgres"
    );

    let store = PostgresStore::connect(&config.postgres).await?;
    if config.init_schema {
        store.init_schema(&watcher.channel).await?;
    }

    Ok(Arc::new(store))
}
