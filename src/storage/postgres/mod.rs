//! PostgreSQL implementation of the policy store.
//!
//! All services live in one table. Policies and role policies are JSONB
//! arrays on the service row, handled by [`JsonArrayStore`]. Change
//! notifications come from a row trigger installed by [`PostgresStore::init_schema`]
//! and are consumed through a dedicated [`PgNotificationSource`] connection.

mod array_store;
mod function_store;
mod listener;
mod policy_store;
mod service_store;

use backon::Retryable;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub use array_store::JsonArrayStore;
pub use listener::PgNotificationSource;

use crate::config::{PostgresConfig, WatcherConfig};
use crate::interfaces::Result;
use crate::model::{Policy, RolePolicy};
use crate::storage::schema::TableNames;
use crate::utils::retry::connection_backoff;
use crate::watcher::{StoreChangeEvent, WatchHandle, Watcher, WatcherError};

/// PostgreSQL-backed policy store.
pub struct PostgresStore {
    pool: PgPool,
    uri: String,
    tables: TableNames,
    policies: JsonArrayStore<Policy>,
    role_policies: JsonArrayStore<RolePolicy>,
}

impl PostgresStore {
    /// Create a store over an existing pool.
    ///
    /// `uri` is used only to open the watcher's listening connection, which
    /// is kept out of the pool.
    pub fn new(pool: PgPool, uri: impl Into<String>, table_prefix: &str) -> Self {
        let tables = TableNames::new(table_prefix);
        Self {
            policies: JsonArrayStore::new(pool.clone(), &tables),
            role_policies: JsonArrayStore::new(pool.clone(), &tables),
            pool,
            uri: uri.into(),
            tables,
        }
    }

    /// Build the pool from configuration, retrying the initial connection.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(config.max_lifetime());

        let pool = (|| {
            let options = options.clone();
            let uri = config.uri.clone();
            async move { options.connect(&uri).await }
        })
        .retry(connection_backoff())
        .notify(|e: &sqlx::Error, delay| {
            warn!(error = %e, delay = ?delay, "PostgreSQL connection failed, retrying");
        })
        .await?;

        info!(
            max_connections = config.max_connections,
            table_prefix = %config.table_prefix,
            "Connected to PostgreSQL"
        );

        Ok(Self::new(pool, config.uri.clone(), &config.table_prefix))
    }

    /// Create the services table and the change trigger publishing on
    /// `channel`. Safe to run repeatedly.
    pub async fn init_schema(&self, channel: &str) -> Result<()> {
        self.create_tables().await?;
        self.install_notify_trigger(channel).await?;
        info!(table = %self.tables.services(), channel, "Schema ready");
        Ok(())
    }

    /// Create the services table only.
    pub async fn create_tables(&self) -> Result<()> {
        self.execute_all(self.tables.create_services_table()).await
    }

    /// (Re)install the row trigger publishing changes on `channel`.
    ///
    /// NOTIFY payloads are limited to 8000 bytes; with the trigger installed,
    /// a write producing a larger row fails.
    pub async fn install_notify_trigger(&self, channel: &str) -> Result<()> {
        self.execute_all(self.tables.create_notify_trigger(channel))
            .await
    }

    async fn execute_all(&self, statements: Vec<String>) -> Result<()> {
        for statement in statements {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Unquoted services table name.
    pub fn services_table(&self) -> String {
        self.tables.services()
    }

    /// Subscribe to change notifications and start a watcher.
    ///
    /// Failing to subscribe is returned here; there is no retry.
    pub async fn watch(
        &self,
        config: &WatcherConfig,
    ) -> std::result::Result<(mpsc::Receiver<StoreChangeEvent>, WatchHandle), WatcherError> {
        let source = PgNotificationSource::connect(&self.uri, &config.channel).await?;
        Ok(Watcher::new(source, self.tables.services(), config.idle_timeout()).start())
    }
}
