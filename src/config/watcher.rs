//! Change watcher configuration.

use std::time::Duration;

use serde::Deserialize;

/// Default notification channel.
pub const DEFAULT_NOTIFY_CHANNEL: &str = "events";

/// Change watcher configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Notification channel the change trigger publishes on.
    pub channel: String,
    /// Ping the listening connection after this many idle seconds.
    pub idle_timeout_secs: u64,
}

impl WatcherConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_NOTIFY_CHANNEL.to_string(),
            idle_timeout_secs: 90,
        }
    }
}
