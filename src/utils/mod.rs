//! Shared helpers for binaries and storage setup.

pub mod bootstrap;
pub mod retry;
