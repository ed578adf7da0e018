//! Shared storage contract tests.
//!
//! Tests the ServiceStore, PolicyStore and RolePolicyStore interfaces against
//! all implementations. Each implementation module imports these test
//! functions and runs them.

pub mod policy_store_tests;
pub mod service_store_tests;
