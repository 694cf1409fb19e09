use std::collections::BTreeMap;

use passvault_core::{Error, Result};
use serde_json::Value;

/// Compact JSON object, keys sorted, `<`, `>` and `&` left unescaped.
pub(crate) fn render(entries: &BTreeMap<String, String>) -> Result<String> {
    serde_json::to_string(entries).map_err(Error::encoding)
}

/// Parses a dump and rejects it as a whole if any value is not a string.
pub(crate) fn parse(input: &str) -> Result<BTreeMap<String, String>> {
    let object: serde_json::Map<String, Value> =
        serde_json::from_str(input).map_err(Error::encoding)?;

    object
        .into_iter()
        .map(|(id, value)| match value {
            Value::String(data) => Ok((id, data)),
            other => Err(Error::Encoding {
                reason: format!("invalid storage value type for {id}: {other}"),
            }),
        })
        .collect()
}
