//! Core abstractions for passvault: the error taxonomy, id normalization and the
//! storage backend contract. Kept free of crypto and I/O dependencies.

pub mod error;
pub mod id;
pub mod storage;

pub use error::{Error, Result};
pub use id::normalize_id;
pub use storage::Storage;
