use sha2::{Digest, Sha256};

/// Constant-time byte comparison. Only the length check short-circuits.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Compares two plaintext secrets through fixed-size SHA-256 digests, so neither the
/// length nor the position of the first difference leaks through timing.
pub fn secrets_match(a: &str, b: &str) -> bool {
    let left = Sha256::digest(a.as_bytes());
    let right = Sha256::digest(b.as_bytes());
    constant_time_eq(&left, &right)
}
