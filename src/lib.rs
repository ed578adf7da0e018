//! PMS store - policy storage with change notifications
//!
//! Services own ordered JSONB arrays of policies and role policies. The
//! PostgreSQL backend stores them in a single table and publishes row changes
//! through LISTEN/NOTIFY, which [`watcher::Watcher`] turns into an ordered
//! stream of service add/delete events.

pub mod config;
pub mod interfaces;
pub mod model;
pub mod storage;
pub mod utils;
pub mod watcher;
