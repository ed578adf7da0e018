//! Storage configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// PostgreSQL-specific configuration.
    pub postgres: PostgresConfig,
    /// Create the services table and change trigger on startup.
    pub init_schema: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            postgres: PostgresConfig::default(),
            init_schema: true,
        }
    }
}

/// PostgreSQL-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// PostgreSQL connection URI.
    pub uri: String,
    /// Prefix applied to every table name.
    pub table_prefix: String,
    /// Pool upper bound.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// Recycle pooled connections after this many seconds.
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            uri: "postgres://localhost:5432/pms".to_string(),
            table_prefix: "pms_".to_string(),
            max_connections: 10,
            min_connections: 0,
            max_lifetime_secs: 15 * 60,
        }
    }
}
