//! Change notification watcher.
//!
//! Bridges raw row-change notifications into an ordered stream of
//! [`StoreChangeEvent`]s. One [`Watcher`] runs as one tokio task:
//!
//! ```text
//! Listening -> Notified  -> (decode, classify, send) -> Listening
//!           -> TimedOut  -> (ping connection)        -> Listening
//!           -> stop / connection error / receiver gone -> Closed
//! ```
//!
//! The task owns the only event sender. It closes the notification source
//! and drops the sender on exit, so the channel closes exactly once and never
//! after a send is attempted.

mod event;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use event::{
    ChangeAction, ChangeEvent, ChangeKind, SequenceGenerator, StoreChange, StoreChangeEvent,
};

/// Events buffered between the watcher and its consumer. Kept at the
/// minimum so a slow consumer holds the watcher back.
const EVENT_BUFFER: usize = 1;

/// Errors raised by the watcher or its notification source.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Failed to subscribe to channel '{channel}': {reason}")]
    Subscribe { channel: String, reason: String },

    #[error("Notification connection error: {0}")]
    Connection(String),

    #[error("Watcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A subscribed stream of raw notification payloads.
///
/// Implementations are already listening when handed to [`Watcher::new`].
#[async_trait]
pub trait NotificationSource: Send + 'static {
    /// Wait for the next payload. An error means the subscription is lost.
    async fn recv(&mut self) -> Result<String, WatcherError>;

    /// Liveness ping, issued after an idle period.
    async fn ping(&mut self) -> Result<(), WatcherError>;

    /// Release the subscription.
    async fn close(&mut self);
}

/// Not yet started watcher. Consumed by [`Watcher::start`].
pub struct Watcher<S: NotificationSource> {
    source: S,
    services_table: String,
    idle_timeout: Duration,
    sequence: Arc<SequenceGenerator>,
}

impl<S: NotificationSource> Watcher<S> {
    /// Create a watcher for changes to `services_table`.
    pub fn new(source: S, services_table: impl Into<String>, idle_timeout: Duration) -> Self {
        Self {
            source,
            services_table: services_table.into(),
            idle_timeout,
            sequence: Arc::new(SequenceGenerator::new()),
        }
    }

    /// Share a sequence generator across watchers.
    pub fn with_sequence(mut self, sequence: Arc<SequenceGenerator>) -> Self {
        self.sequence = sequence;
        self
    }

    /// Spawn the watch loop.
    ///
    /// Returns the event receiver and a handle that stops the loop.
    pub fn start(self) -> (mpsc::Receiver<StoreChangeEvent>, WatchHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        info!(
            table = %self.services_table,
            idle_timeout = ?self.idle_timeout,
            "Change watcher started"
        );

        let task = tokio::spawn(self.run(events_tx, cancel_rx));

        (
            events_rx,
            WatchHandle {
                cancel: cancel_tx,
                task,
            },
        )
    }

    async fn run(
        mut self,
        events: mpsc::Sender<StoreChangeEvent>,
        mut cancel: watch::Receiver<bool>,
    ) {
        'watch: loop {
            let next = tokio::select! {
                biased;
                _ = cancel.changed() => break 'watch,
                next = tokio::time::timeout(self.idle_timeout, self.source.recv()) => next,
            };

            let payload = match next {
                Ok(Ok(payload)) => payload,
                Ok(Err(e)) => {
                    error!(error = %e, "Notification source failed, stopping watcher");
                    break 'watch;
                }
                Err(_) => {
                    debug!(
                        idle_timeout = ?self.idle_timeout,
                        "No notifications received, checking connection"
                    );
                    let pinged = tokio::select! {
                        biased;
                        _ = cancel.changed() => break 'watch,
                        pinged = self.source.ping() => pinged,
                    };
                    if let Err(e) = pinged {
                        error!(error = %e, "Connection ping failed, stopping watcher");
                        break 'watch;
                    }
                    continue;
                }
            };

            let changes = match ChangeEvent::decode(&payload) {
                Ok(event) => {
                    debug!(
                        table = %event.table,
                        action = ?event.action,
                        service = %event.service.name,
                        "Received change notification"
                    );
                    event.classify(&self.services_table)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to decode change notification");
                    continue;
                }
            };

            for change in changes {
                let event = StoreChangeEvent {
                    sequence_id: self.sequence.next_id(),
                    change,
                };
                debug!(
                    sequence_id = event.sequence_id,
                    kind = ?event.kind(),
                    "Emitting store change"
                );

                tokio::select! {
                    biased;
                    _ = cancel.changed() => break 'watch,
                    sent = events.send(event) => {
                        if sent.is_err() {
                            info!("Change event receiver dropped");
                            break 'watch;
                        }
                    }
                }
            }
        }

        self.source.close().await;
        drop(events);
        info!(table = %self.services_table, "Change watcher stopped");
    }
}

/// Handle to a running watcher.
///
/// Dropping the handle also stops the watcher.
pub struct WatchHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Signal the watcher to stop and wait until the event channel is closed.
    pub async fn stop(self) -> Result<(), WatcherError> {
        let _ = self.cancel.send(true);
        self.task.await?;
        Ok(())
    }

    /// True once the watch loop has exited for any reason.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
