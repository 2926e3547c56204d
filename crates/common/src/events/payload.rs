//! Decoding helpers shared by event payloads.

use serde::{Deserialize, Deserializer};

/// Deserialize an identifier that may arrive as a JSON number or string.
///
/// Meeting-provider ids are 64-bit integers; they are kept as strings
/// everywhere so large values never pass through a float.
///
/// # Errors
///
/// Fails for floats, `null`, and non-scalar values.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Unsigned(n) => n.to_string(),
        Raw::Signed(n) => n.to_string(),
    })
}
