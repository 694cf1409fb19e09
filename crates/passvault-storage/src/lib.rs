//! Concrete storage backends: a disk-backed store with per-id locking and an in-memory
//! store for ephemeral use and tests.

mod dump;
pub mod file_store;
pub mod lock_table;
pub mod memory_store;

pub use file_store::{FileStorage, DEFAULT_FILE_ENDING, DEFAULT_STORE_PATH};
pub use lock_table::LockTable;
pub use memory_store::MemoryStorage;
