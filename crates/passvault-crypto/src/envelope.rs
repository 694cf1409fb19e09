//! Plaintext envelope that is encrypted as a unit.
//!
//! Besides the id and the secret it carries space padding, so short secrets do not map to
//! proportionally short ciphertexts, and random entropy, so re-encrypting an identical
//! secret never yields related plaintexts. Decoding is strict: unknown, missing or
//! mistyped fields are errors.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use passvault_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::random::fill_random;

pub const ENTROPY_LENGTH: usize = 24;
pub const PADDING_BLOCK_LENGTH: usize = 16;
/// `chrono` rendering of `2006-01-02T15:04:05-07:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

// Field order is alphabetical so the serialized form is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    pub data: String,
    pub entropy: String,
    pub id: String,
    pub padding: String,
    pub timestamp: String,
}

impl Envelope {
    /// Fresh envelope stamped with the local time.
    pub fn new(id: &str, data: &str) -> Result<Self> {
        let mut entropy = [0u8; ENTROPY_LENGTH];
        fill_random(&mut entropy)?;

        Ok(Self {
            data: data.to_string(),
            entropy: STANDARD.encode(entropy),
            id: id.to_string(),
            padding: " ".repeat(padding_length(data.len())),
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        })
    }

    /// Compact JSON without HTML escaping.
    pub fn pack(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::encoding)
    }

    pub fn unpack(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(Error::encoding)
    }
}

/// Rounds up to the next padding block boundary plus one byte.
pub fn padding_length(data_length: usize) -> usize {
    PADDING_BLOCK_LENGTH - (data_length % PADDING_BLOCK_LENGTH) + 1
}

pub fn pack_envelope(id: &str, data: &str) -> Result<String> {
    Envelope::new(id, data)?.pack()
}

/// Returns `(id, data)` of a packed envelope.
pub fn unpack_envelope(input: &str) -> Result<(String, String)> {
    let envelope = Envelope::unpack(input)?;
    Ok((envelope.id, envelope.data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_then_unpack_returns_id_and_data() {
        let packed = pack_envelope("foo<>&", "bar<>&").expect("pack");
        assert!(packed.contains(r#""id":"foo<>&""#), "no html escaping: {packed}");
        assert!(!packed.contains('\n'));

        let (id, data) = unpack_envelope(&packed).expect("unpack");
        assert_eq!(id, "foo<>&");
        assert_eq!(data, "bar<>&");
    }

    #[test]
    fn envelope_carries_metadata() {
        let envelope = Envelope::new("foo", "123").expect("envelope");
        assert_eq!(envelope.padding.len(), 14);
        assert_eq!(
            STANDARD.decode(&envelope.entropy).expect("base64").len(),
            ENTROPY_LENGTH
        );
        assert!(chrono::DateTime::parse_from_str(&envelope.timestamp, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn entropy_differs_between_envelopes() {
        let a = Envelope::new("foo", "same").expect("envelope");
        let b = Envelope::new("foo", "same").expect("envelope");
        assert_ne!(a.entropy, b.entropy);
    }

    #[test]
    fn padding_never_zero() {
        assert_eq!(padding_length(0), 17);
        assert_eq!(padding_length(15), 2);
        assert_eq!(padding_length(16), 17);
        assert_eq!(padding_length(17), 16);
    }

    #[test]
    fn unpack_rejects_malformed_input() {
        let full = r#"{"data":"bar","entropy":"e","id":"foo","padding":" ","timestamp":"t"}"#;
        assert!(unpack_envelope(full).is_ok());

        let rejected = [
            "",
            "not json",
            r#"{"data":"bar","id":"foo"}"#,
            r#"{"data":"bar","entropy":"e","id":"foo","padding":" ","timestamp":"t","x":1}"#,
            r#"{"data":1,"entropy":"e","id":"foo","padding":" ","timestamp":"t"}"#,
            r#"{"data":"bar","entropy":"e","id":null,"padding":" ","timestamp":"t"}"#,
        ];
        for input in rejected {
            let err = unpack_envelope(input).expect_err(input);
            assert!(matches!(err, Error::Encoding { .. }), "{input}: {err:?}");
        }
    }
}
