//! LISTEN/NOTIFY notification source.

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use tracing::{debug, warn};

use crate::watcher::{NotificationSource, WatcherError};

/// Dedicated listening connection.
///
/// Opened from the connection URI rather than borrowed from the pool, so pool
/// recycling never drops the subscription.
pub struct PgNotificationSource {
    listener: PgListener,
    channel: String,
}

impl PgNotificationSource {
    /// Connect and `LISTEN` on `channel`.
    pub async fn connect(uri: &str, channel: &str) -> Result<Self, WatcherError> {
        let subscribe_error = |e: sqlx::Error| WatcherError::Subscribe {
            channel: channel.to_string(),
            reason: e.to_string(),
        };

        let mut listener = PgListener::connect(uri).await.map_err(subscribe_error)?;
        listener.listen(channel).await.map_err(subscribe_error)?;

        debug!(channel, "Listening for change notifications");
        Ok(Self {
            listener,
            channel: channel.to_string(),
        })
    }
}

#[async_trait]
impl NotificationSource for PgNotificationSource {
    async fn recv(&mut self) -> Result<String, WatcherError> {
        let notification = self
            .listener
            .recv()
            .await
            .map_err(|e| WatcherError::Connection(e.to_string()))?;

        debug!(
            channel = notification.channel(),
            process_id = notification.process_id(),
            "Notification received"
        );
        Ok(notification.payload().to_string())
    }

    async fn ping(&mut self) -> Result<(), WatcherError> {
        sqlx::query("SELECT 1")
            .execute(&mut self.listener)
            .await
            .map_err(|e| WatcherError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.listener.unlisten(&self.channel).await {
            warn!(channel = %self.channel, error = %e, "Failed to unlisten");
        }
    }
}
