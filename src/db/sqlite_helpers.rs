//! SQLite helper utilities for type conversion
//!
//! SQLite has no native UUID, JSON or timestamp types; values are stored as TEXT.

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Fresh random id in its TEXT form
#[inline]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get current UTC timestamp as ISO8601 string for SQLite
#[inline]
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}

/// Serialize a value to a JSON string for storage
#[inline]
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| anyhow!("JSON encode error: {}", e))
}

/// Deserialize a JSON string from storage
#[inline]
pub fn from_json<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| anyhow!("JSON parse error: {}", e))
}
