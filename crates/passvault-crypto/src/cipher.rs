use std::{fmt, sync::Arc};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use passvault_core::{Error, Result};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    compare::constant_time_eq,
    kdf::{Argon2Kdf, KeyDerivation, KEY_LENGTH},
    random::fill_random,
};

pub const SALT_LENGTH: usize = 32;
pub const NONCE_LENGTH: usize = 12;

/// Envelope encryption and password hashing on top of a pluggable key derivation.
///
/// Ciphertexts are `base64(salt || nonce || ciphertext || tag)`: every call draws a fresh
/// salt, derives an AES-256-GCM key from the secret and the salt, and seals under a fresh
/// nonce. Stored password hashes are `base64(salt || derive(password, salt))`.
#[derive(Clone)]
pub struct Crypto {
    kdf: Arc<dyn KeyDerivation>,
}

impl Default for Crypto {
    fn default() -> Self {
        Self::new(Argon2Kdf::default())
    }
}

impl fmt::Debug for Crypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crypto").field("kdf", &self.kdf).finish()
    }
}

impl Crypto {
    pub fn new(kdf: impl KeyDerivation + 'static) -> Self {
        Self { kdf: Arc::new(kdf) }
    }

    pub fn derive_key(&self, secret: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
        self.kdf.derive(secret.as_bytes(), salt)
    }

    pub fn encrypt(&self, plaintext: &str, secret: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LENGTH];
        fill_random(&mut salt)?;

        let key = self.derive_key(secret, &salt)?;
        let cipher = build_cipher(&key)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher.encrypt(&nonce, plaintext.as_bytes()).map_err(|e| {
            debug!(error = %e, "encrypt failed");
            Error::Crypto
        })?;

        let mut out = Vec::with_capacity(SALT_LENGTH + NONCE_LENGTH + sealed.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    /// Every failure before the plaintext is authenticated surfaces as the same
    /// [`Error::Crypto`]; the cause is only logged.
    pub fn decrypt(&self, ciphertext: &str, secret: &str) -> Result<String> {
        let bytes = STANDARD.decode(ciphertext).map_err(|e| {
            debug!(error = %e, "ciphertext decode failed");
            Error::Crypto
        })?;
        if bytes.len() < SALT_LENGTH + NONCE_LENGTH {
            debug!(length = bytes.len(), "ciphertext is too short");
            return Err(Error::Crypto);
        }

        let (salt, rest) = bytes.split_at(SALT_LENGTH);
        let (nonce, sealed) = rest.split_at(NONCE_LENGTH);

        let key = self.derive_key(secret, salt)?;
        let cipher = build_cipher(&key)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|e| {
                debug!(error = %e, "ciphertext authentication failed");
                Error::Crypto
            })?;

        String::from_utf8(plaintext).map_err(|_| Error::Encoding {
            reason: "invalid utf8 after decryption".to_string(),
        })
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LENGTH];
        fill_random(&mut salt)?;

        let hash = self.derive_key(password, &salt)?;
        let mut stored = Vec::with_capacity(SALT_LENGTH + KEY_LENGTH);
        stored.extend_from_slice(&salt);
        stored.extend_from_slice(&hash[..]);
        Ok(STANDARD.encode(stored))
    }

    /// Rehashes `password` with the salt embedded in `stored` and compares in constant time.
    pub fn verify_hashed_password(&self, stored: &str, password: &str) -> Result<bool> {
        let expected = STANDARD.decode(stored).map_err(Error::encoding)?;
        if expected.len() < SALT_LENGTH {
            return Err(Error::Encoding {
                reason: "hashed password is too short".to_string(),
            });
        }

        let salt = &expected[..SALT_LENGTH];
        let hash = self.derive_key(password, salt)?;
        let mut candidate = Vec::with_capacity(SALT_LENGTH + KEY_LENGTH);
        candidate.extend_from_slice(salt);
        candidate.extend_from_slice(&hash[..]);

        Ok(constant_time_eq(&expected, &candidate))
    }
}

fn build_cipher(key: &[u8; KEY_LENGTH]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|e| {
        debug!(error = %e, "cipher init failed");
        Error::Crypto
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::kdf::Sha256Kdf;

    fn fast() -> Crypto {
        Crypto::new(Sha256Kdf)
    }

    #[test]
    fn default_argon2_round_trip() {
        let crypto = Crypto::default();
        let sealed = crypto.encrypt("hello-passvault", "storage-key").expect("encrypt");
        assert!(!sealed.contains("hello-passvault"));
        assert_eq!(
            crypto.decrypt(&sealed, "storage-key").expect("decrypt"),
            "hello-passvault"
        );
    }

    #[test]
    fn layout_is_salt_nonce_body() {
        let sealed = fast().encrypt("abc", "k").expect("encrypt");
        let raw = STANDARD.decode(sealed).expect("base64");
        // 16 byte GCM tag.
        assert_eq!(raw.len(), SALT_LENGTH + NONCE_LENGTH + 3 + 16);
    }

    #[test]
    fn wrong_secret_and_garbage_fail_identically() {
        let crypto = fast();
        let sealed = crypto.encrypt("payload", "right").expect("encrypt");

        let wrong = crypto.decrypt(&sealed, "wrong").expect_err("wrong secret");
        let short = crypto.decrypt("AAAA", "right").expect_err("too short");
        let invalid = crypto.decrypt("***", "right").expect_err("not base64");

        assert_eq!(wrong, Error::Crypto);
        assert_eq!(short, wrong);
        assert_eq!(invalid, wrong);
    }

    #[test]
    fn repeated_encryption_differs() {
        let crypto = fast();
        let a = crypto.encrypt("same", "key").expect("encrypt");
        let b = crypto.encrypt("same", "key").expect("encrypt");
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_an_encoding_error() {
        let crypto = fast();
        assert!(matches!(
            crypto.verify_hashed_password("AAAA", "pw"),
            Err(Error::Encoding { .. })
        ));
        assert!(matches!(
            crypto.verify_hashed_password("not base64!", "pw"),
            Err(Error::Encoding { .. })
        ));
    }

    #[test]
    fn default_hash_verifies() {
        let crypto = Crypto::default();
        let stored = crypto.hash_password("123").expect("hash");
        assert_ne!(stored, "123");
        assert!(crypto.verify_hashed_password(&stored, "123").expect("verify"));
        assert!(!crypto.verify_hashed_password(&stored, "1234").expect("verify"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn decrypt_inverts_encrypt(text in ".{0,256}", secret in ".{0,64}") {
            let crypto = fast();
            let sealed = crypto.encrypt(&text, &secret).unwrap();
            prop_assert_eq!(crypto.decrypt(&sealed, &secret).unwrap(), text);
        }

        #[test]
        fn any_flipped_byte_is_detected(
            text in ".{1,128}",
            position in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let crypto = fast();
            let sealed = crypto.encrypt(&text, "secret").unwrap();
            let mut raw = STANDARD.decode(&sealed).unwrap();
            let index = position.index(raw.len());
            raw[index] ^= flip;
            let tampered = STANDARD.encode(raw);
            prop_assert_eq!(crypto.decrypt(&tampered, "secret"), Err(Error::Crypto));
        }

        #[test]
        fn hash_verifies_only_original(password in ".{0,64}", other in ".{0,64}") {
            prop_assume!(password != other);
            let crypto = fast();
            let stored = crypto.hash_password(&password).unwrap();
            prop_assert!(crypto.verify_hashed_password(&stored, &password).unwrap());
            prop_assert!(!crypto.verify_hashed_password(&stored, &other).unwrap());
        }
    }
}
