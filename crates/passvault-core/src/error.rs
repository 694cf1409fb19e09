use thiserror::Error;

/// Errors produced by every passvault layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Random generation, key derivation or cipher failure, including failed authentication
    /// of a ciphertext. Carries no detail so wrong keys and tampered data look the same.
    #[error("cryptographic operation failed")]
    Crypto,
    /// Malformed envelope, JSON or non UTF-8 data.
    #[error("encoding error: {reason}")]
    Encoding { reason: String },
    /// Requested id does not exist.
    #[error("entry not found for id: {id}")]
    NotFound { id: String },
    /// Password or key check failed.
    #[error("authentication failed")]
    Auth,
    /// A decoded envelope belongs to a different id than the one requested.
    #[error("stored id does not match requested id: {id}")]
    Integrity { id: String },
    /// Underlying filesystem or lock failure.
    #[error("io failure: {reason}")]
    Io { reason: String },
    /// The operation is only available on another storage backend.
    #[error("operation not supported by storage backend: {operation}")]
    UnsupportedBackend { operation: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn encoding<E: ToString>(err: E) -> Self {
        Error::Encoding {
            reason: err.to_string(),
        }
    }

    pub fn io<E: ToString>(err: E) -> Self {
        Error::Io {
            reason: err.to_string(),
        }
    }
}
