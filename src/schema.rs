//! Wire types for annotation objects and manifest column names

use serde::{Deserialize, Deserializer};

/// Fixed manifest column holding the item identifier
pub const ITEM_ID_COLUMN: &str = "item_id";

/// Fixed manifest column holding the image filename
pub const FILENAME_COLUMN: &str = "filename";

/// One annotation fact: `key = value` for the image `filename` of `item_id`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelTuple {
    /// Item identifier; doubles as the image object name under the images prefix
    #[serde(rename = "uuid", alias = "item_id", deserialize_with = "identifier")]
    pub item_id: String,
    pub filename: String,
    pub key: String,
    /// Arbitrary JSON value; rendered to text when the manifest is built
    #[serde(default)]
    pub value: serde_json::Value,
}

impl LabelTuple {
    pub fn new(
        item_id: impl Into<String>,
        filename: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            filename: filename.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Contents of a single annotation object.
///
/// A record without a `labels` field is valid and contributes nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationRecord {
    #[serde(default)]
    pub labels: Vec<LabelTuple>,
}

/// Accept identifiers written as JSON strings or numbers.
fn identifier<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "item id must be a string or number, got {}",
            other
        ))),
    }
}

/// Render a label value as a manifest cell. `None` means an empty cell.
pub fn render_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
