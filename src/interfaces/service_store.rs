//! Service storage interface.

use async_trait::async_trait;
use tracing::info;

use crate::model::{Service, StoreSnapshot};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Missing service, or missing sub-document within an existing service.
    /// The two are not distinguished for sub-document lookups.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Service already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Encoding error: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("Corrupt data in {column} of service '{service}': {reason}")]
    CorruptData {
        service: String,
        column: &'static str,
        reason: String,
    },

    #[cfg(feature = "postgres")]
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Not implemented: {0}")]
    Unimplemented(&'static str),
}

impl StorageError {
    pub fn service_not_found(name: &str) -> Self {
        StorageError::NotFound {
            entity: "service",
            key: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StorageError::Connection(err),
            other => StorageError::Database(other),
        }
    }
}

/// Interface for top-level service rows.
///
/// Implementations:
/// - `PostgresStore`: PostgreSQL storage
/// - `MockPolicyStore`: in-memory storage for tests
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Insert a service. Missing collections are stored as empty arrays.
    async fn create_service(&self, service: Service) -> Result<()>;

    async fn get_service(&self, name: &str) -> Result<Service>;

    /// Delete one service. Fails with `NotFound` when nothing was deleted.
    async fn delete_service(&self, name: &str) -> Result<()>;

    /// Delete every service. Succeeds when the store is already empty.
    async fn delete_services(&self) -> Result<()>;

    async fn list_all_services(&self) -> Result<Vec<Service>>;

    async fn get_service_count(&self) -> Result<i64>;

    async fn get_service_names(&self) -> Result<Vec<String>>;

    /// Export every service.
    async fn read_policy_store(&self) -> Result<StoreSnapshot> {
        Ok(StoreSnapshot {
            services: self.list_all_services().await?,
            functions: Vec::new(),
        })
    }

    /// Replace the whole store with `snapshot`.
    ///
    /// Functions are not stored by this crate; a snapshot carrying any is
    /// rejected before existing data is touched.
    async fn write_policy_store(&self, snapshot: StoreSnapshot) -> Result<()> {
        if !snapshot.functions.is_empty() {
            return Err(StorageError::Unimplemented("function storage"));
        }

        self.delete_services().await?;

        let count = snapshot.services.len();
        for service in snapshot.services {
            self.create_service(service).await?;
        }

        info!(services = count, "Policy store replaced");
        Ok(())
    }
}
