//! Asset identifiers and id parsing
//!
//! Metadata values and block attributes are untyped strings or JSON values.
//! Everything that might hold an asset id goes through one explicit
//! parse-and-validate step here, so callers branch on `Option<AssetId>`
//! instead of relying on loose numeric coercion.

use serde::{Deserialize, Serialize};

/// Identifier of one binary asset record in the store. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(u64);

impl AssetId {
    /// Create an id, rejecting zero
    pub fn new(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// The raw integer value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a content record (post, page, product...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub u64);

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An asset record as stored: id plus MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: AssetId,
    pub mime_type: String,
}

impl AssetRecord {
    /// Only image records belong to the scan universe
    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }
}

/// `image/*` check used by the registry
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Parse a metadata string as an asset id.
///
/// Surrounding ASCII whitespace is ignored; the rest must be one or more
/// ASCII digits. Zero, signs, decimals and values that overflow are rejected.
pub fn parse_as_asset_id(value: &str) -> Option<AssetId> {
    let value = value.trim_ascii();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().and_then(AssetId::new)
}

/// Read an asset id out of a JSON attribute value (number or numeric string).
pub fn asset_id_from_json(value: &serde_json::Value) -> Option<AssetId> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(AssetId::new),
        serde_json::Value::String(s) => parse_as_asset_id(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_as_asset_id() {
        assert_eq!(parse_as_asset_id("42"), AssetId::new(42));
        assert_eq!(parse_as_asset_id("  7 "), AssetId::new(7));
        assert_eq!(parse_as_asset_id("0"), None);
        assert_eq!(parse_as_asset_id(""), None);
        assert_eq!(parse_as_asset_id("12abc"), None);
        assert_eq!(parse_as_asset_id("-3"), None);
        assert_eq!(parse_as_asset_id("1.5"), None);
        assert_eq!(parse_as_asset_id("99999999999999999999999"), None);
    }

    #[test]
    fn test_asset_id_from_json() {
        assert_eq!(asset_id_from_json(&json!(12)), AssetId::new(12));
        assert_eq!(asset_id_from_json(&json!("13")), AssetId::new(13));
        assert_eq!(asset_id_from_json(&json!(-1)), None);
        assert_eq!(asset_id_from_json(&json!(2.5)), None);
        assert_eq!(asset_id_from_json(&json!(null)), None);
        assert_eq!(asset_id_from_json(&json!([1])), None);
    }

    #[test]
    fn test_is_image_mime() {
        assert!(is_image_mime("image/jpeg"));
        assert!(is_image_mime("image/svg+xml"));
        assert!(!is_image_mime("application/pdf"));
        assert!(!is_image_mime("video/image"));
        assert!(is_image_mime("Image/PNG"));
        assert!(!is_image_mime("image"));
    }
}
