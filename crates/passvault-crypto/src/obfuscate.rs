//! One-time-pad obfuscation for long-lived secrets held in memory.
//!
//! This only avoids a single plaintext buffer sitting in the heap. It offers no protection
//! against anyone able to read process memory.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// XORs `secret` with fresh random key material of the same length.
/// Returns `(cipher, key)`.
pub fn obfuscate_secret(secret: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut key = vec![0u8; secret.len()];
    OsRng.fill_bytes(&mut key);
    let cipher = secret.iter().zip(&key).map(|(s, k)| s ^ k).collect();
    (cipher, key)
}

/// Inverse of [`obfuscate_secret`]. Extra bytes on the longer side are ignored.
pub fn reveal_secret(cipher: &[u8], key: &[u8]) -> Vec<u8> {
    cipher.iter().zip(key).map(|(c, k)| c ^ k).collect()
}

/// A secret stored as two equal-length buffers; both are wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ObfuscatedSecret {
    cipher: Vec<u8>,
    key: Vec<u8>,
}

impl ObfuscatedSecret {
    pub fn new(secret: &str) -> Self {
        let (cipher, key) = obfuscate_secret(secret.as_bytes());
        Self { cipher, key }
    }

    /// Rebuilds the plaintext for the duration of one use.
    pub fn reveal(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(reveal_secret(&self.cipher, &self.key));
        Zeroizing::new(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn cipher(&self) -> &[u8] {
        &self.cipher
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for ObfuscatedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObfuscatedSecret")
            .field("len", &self.cipher.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_reconstructs_secret() {
        let (cipher, key) = obfuscate_secret(b"recovery-key");
        assert_eq!(cipher.len(), key.len());
        assert_eq!(reveal_secret(&cipher, &key), b"recovery-key");
    }

    #[test]
    fn obfuscated_secret_round_trip() {
        let secret = ObfuscatedSecret::new("rk");
        assert_eq!(secret.reveal().as_str(), "rk");
        assert_eq!(secret.cipher().len(), 2);
        assert!(!format!("{secret:?}").contains("rk"));
    }

    #[test]
    fn empty_secret_is_supported() {
        let secret = ObfuscatedSecret::new("");
        assert_eq!(secret.reveal().as_str(), "");
    }

    #[test]
    fn zeroize_clears_buffers() {
        let mut secret = ObfuscatedSecret::new("wipe-me");
        secret.zeroize();
        assert!(secret.cipher().is_empty());
        assert!(secret.key().is_empty());
    }
}
