//! Envelope crypto for passvault: key derivation, AES-256-GCM encryption, password
//! hashing, constant-time comparison and in-memory secret obfuscation.

pub mod cipher;
pub mod compare;
pub mod envelope;
pub mod kdf;
pub mod obfuscate;
mod random;

pub use cipher::Crypto;
pub use compare::{constant_time_eq, secrets_match};
pub use envelope::{pack_envelope, unpack_envelope, Envelope};
pub use kdf::{Argon2Kdf, KeyDerivation, Sha256Kdf};
pub use obfuscate::{obfuscate_secret, reveal_secret, ObfuscatedSecret};
