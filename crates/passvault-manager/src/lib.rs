//! Credential manager composing envelope crypto with a storage backend, plus an explicit
//! registry of named managers.

pub mod manager;
pub mod registry;

pub use manager::{is_recovery_id, Manager, RECOVERY_ID_SUFFIX};
pub use registry::{ManagerRegistry, DEFAULT_MANAGER};
