//! Raw change notifications and the domain events derived from them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::model::Service;

/// Row operation reported by the change trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
    /// Anything else; produces no domain event.
    #[serde(other)]
    Other,
}

/// Decoded notification payload: `{table, action, data}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub action: ChangeAction,
    #[serde(rename = "data")]
    pub service: Service,
}

impl ChangeEvent {
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Translate into domain changes for consumers of `services_table`.
    ///
    /// An update is reported as delete followed by add, so a consumer that
    /// applies events idempotently converges on the latest row.
    pub fn classify(self, services_table: &str) -> Vec<StoreChange> {
        if self.table != services_table {
            return Vec::new();
        }

        match self.action {
            ChangeAction::Update => vec![
                StoreChange::ServiceDelete(vec![self.service.name.clone()]),
                StoreChange::ServiceAdd(Box::new(self.service)),
            ],
            ChangeAction::Delete => vec![StoreChange::ServiceDelete(vec![self.service.name])],
            ChangeAction::Create => vec![StoreChange::ServiceAdd(Box::new(self.service))],
            ChangeAction::Other => Vec::new(),
        }
    }
}

/// Event kind, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    ServiceAdd,
    ServiceDelete,
}

/// Domain change carried by a [`StoreChangeEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreChange {
    /// Full service state to insert.
    ServiceAdd(Box<Service>),
    /// Names of services to remove.
    ServiceDelete(Vec<String>),
}

impl StoreChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            StoreChange::ServiceAdd(_) => ChangeKind::ServiceAdd,
            StoreChange::ServiceDelete(_) => ChangeKind::ServiceDelete,
        }
    }
}

/// Event delivered to watcher consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreChangeEvent {
    /// Increasing per watcher; for tracing only, not an ordering guarantee
    /// across watchers.
    pub sequence_id: u64,
    #[serde(flatten)]
    pub change: StoreChange,
}

impl StoreChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        self.change.kind()
    }
}

/// Monotonic sequence ids seeded from the wall clock, so ids from a
/// restarted watcher usually continue above the previous run's.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp_micros().max(0) as u64)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}
