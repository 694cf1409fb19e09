use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use passvault_core::{Error, Result};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

/// Length of every derived key (AES-256).
pub const KEY_LENGTH: usize = 32;

/// Derives a 256-bit key from a secret and a salt. Swap the implementation through
/// [`crate::Crypto::new`] without touching any caller.
pub trait KeyDerivation: Send + Sync + fmt::Debug {
    fn derive(&self, secret: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>>;
}

/// Memory-hard default: Argon2i, 3 passes over 32 MiB with 4 lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Kdf {
    pub time_cost: u32,
    pub memory_kib: u32,
    pub lanes: u32,
}

impl Default for Argon2Kdf {
    fn default() -> Self {
        Self {
            time_cost: 3,
            memory_kib: 32 * 1024,
            lanes: 4,
        }
    }
}

impl KeyDerivation for Argon2Kdf {
    fn derive(&self, secret: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
        let params = Params::new(self.memory_kib, self.time_cost, self.lanes, Some(KEY_LENGTH))
            .map_err(|e| {
                debug!(error = %e, "invalid argon2 parameters");
                Error::Crypto
            })?;
        let argon2 = Argon2::new(Algorithm::Argon2i, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        argon2
            .hash_password_into(secret, salt, key.as_mut())
            .map_err(|e| {
                debug!(error = %e, "argon2 derivation failed");
                Error::Crypto
            })?;
        Ok(key)
    }
}

/// Single SHA-256 over `salt || secret`. Fast, so only meant for tests and fixtures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha256Kdf;

impl KeyDerivation for Sha256Kdf {
    fn derive(&self, secret: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(secret);
        Ok(Zeroizing::new(hasher.finalize().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_is_deterministic_per_salt() {
        let kdf = Argon2Kdf {
            time_cost: 1,
            memory_kib: 64,
            lanes: 1,
        };
        let a = kdf.derive(b"secret", b"saltsaltsalt").expect("derive");
        let b = kdf.derive(b"secret", b"saltsaltsalt").expect("derive");
        let c = kdf.derive(b"secret", b"othersaltsalt").expect("derive");
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn argon2_rejects_short_salt() {
        let err = Argon2Kdf::default()
            .derive(b"secret", b"salt")
            .expect_err("salt below 8 bytes");
        assert_eq!(err, Error::Crypto);
    }

    #[test]
    fn sha256_depends_on_salt_and_secret() {
        let base = Sha256Kdf.derive(b"secret", b"salt").expect("derive");
        assert_ne!(*base, *Sha256Kdf.derive(b"secret", b"pepper").expect("derive"));
        assert_ne!(*base, *Sha256Kdf.derive(b"secrets", b"salt").expect("derive"));
    }
}
