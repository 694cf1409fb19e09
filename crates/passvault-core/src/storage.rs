use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Contract every storage backend fulfils. Ids are normalized by the backend itself,
/// payloads are opaque strings (normally base64 ciphertext).
///
/// The path and disk-transfer operations only make sense for some backends and default to
/// [`Error::UnsupportedBackend`].
pub trait Storage: Send + Sync {
    /// Create or overwrite the entry for `id`.
    fn store(&self, id: &str, data: &str) -> Result<()>;

    /// Read the entry for `id`, failing with [`Error::NotFound`] when absent.
    fn retrieve(&self, id: &str) -> Result<String>;

    fn exists(&self, id: &str) -> Result<bool>;

    /// All stored ids in ascending order.
    fn list(&self) -> Result<Vec<String>>;

    /// Remove the entry for `id`, failing with [`Error::NotFound`] when absent.
    fn delete(&self, id: &str) -> Result<()>;

    /// Remove every entry.
    fn clean(&self) -> Result<()>;

    /// Serialize all entries as one compact JSON object of id to stored payload.
    fn dump_json(&self) -> Result<String>;

    /// Store every entry of a JSON object produced by [`Storage::dump_json`].
    fn load_json(&self, input: &str) -> Result<()>;

    fn store_path(&self) -> Result<PathBuf> {
        Err(Error::UnsupportedBackend {
            operation: "store_path",
        })
    }

    fn set_store_path(&self, _path: &Path) -> Result<()> {
        Err(Error::UnsupportedBackend {
            operation: "set_store_path",
        })
    }

    fn file_ending(&self) -> Result<String> {
        Err(Error::UnsupportedBackend {
            operation: "file_ending",
        })
    }

    fn set_file_ending(&self, _ending: &str) -> Result<()> {
        Err(Error::UnsupportedBackend {
            operation: "set_file_ending",
        })
    }

    fn file_path(&self, _id: &str) -> Result<PathBuf> {
        Err(Error::UnsupportedBackend {
            operation: "file_path",
        })
    }

    /// Copy all entries into a disk-backed store rooted at `path`.
    fn write_to_disk(&self, _path: &Path) -> Result<()> {
        Err(Error::UnsupportedBackend {
            operation: "write_to_disk",
        })
    }

    /// Copy all entries of a disk-backed store rooted at `path` into this backend.
    fn read_from_disk(&self, _path: &Path) -> Result<()> {
        Err(Error::UnsupportedBackend {
            operation: "read_from_disk",
        })
    }
}
