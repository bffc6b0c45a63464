//! Persisted library records (`images` table).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::AppError;

/// A result the user chose to keep. Never mutated after creation; deletion is
/// the only lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedImage {
    /// Backend-generated identifier; absent before insertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    /// Display name (the original filename, unsanitized).
    pub name: String,
    /// Public retrieval locator.
    pub url: String,
    /// Tool-type tag: `compressed`, `enhanced`, or `bg-removed`.
    #[serde(rename = "type")]
    pub kind: String,
    /// ISO8601 creation timestamp.
    pub date: String,
    /// Human-readable size/quality label, e.g. "1.2 MB (Q80)".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl SavedImage {
    /// Serialize into a backend row.
    pub fn to_row(&self) -> Result<JsonValue, AppError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a backend row.
    pub fn from_row(row: JsonValue) -> Result<Self, AppError> {
        Ok(serde_json::from_value(row)?)
    }
}
