//! Abstract interfaces for policy storage.
//!
//! These traits define the contracts for:
//! - Service rows (create, delete, bulk import/export)
//! - Policies and role policies embedded in a service row
//! - Functions (capability stub)

pub mod function_store;
pub mod policy_store;
pub mod service_store;

pub use function_store::FunctionStore;
pub use policy_store::{PolicyStore, RolePolicyStore};
pub use service_store::{Result, ServiceStore, StorageError};
