//! Structured-record access to raw notifications
//!
//! Raw notifications carry a wide range of fields, so they are interpreted
//! only once the type is known. Every accessor takes a fallback that is
//! returned when the field is missing or malformed; ingestion never aborts on
//! a bad field.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{Handle, NodeKind};

/// One `{h, t}` entry of a node array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleType {
    pub handle: Handle,
    pub kind: NodeKind,
}

/// Typed, fallback-defaulted field lookups over one raw notification
pub trait AlertRecord {
    /// Type discriminator (`t` field)
    fn type_tag(&self) -> &str;

    /// Whether the field is present at all
    fn has(&self, field: &str) -> bool;

    fn int(&self, field: &str, default: i32) -> i32;

    fn int64(&self, field: &str, default: i64) -> i64;

    fn handle(&self, field: &str, default: Handle) -> Handle;

    fn string(&self, field: &str, default: &str) -> String;

    /// Nested `[{h, t}, ...]` array; `None` if absent or not an array
    fn handle_types(&self, field: &str) -> Option<Vec<HandleType>>;
}

/// Adapter exposing an already-decoded JSON object as an [`AlertRecord`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAlert {
    type_tag: String,
    fields: Map<String, Value>,
}

impl RawAlert {
    /// Wrap a JSON value. Non-objects become a record with an empty tag,
    /// which ingestion skips as unknown.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => {
                let type_tag = fields
                    .get("t")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Self { type_tag, fields }
            }
            _ => Self::default(),
        }
    }

    fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

fn value_to_handle(value: &Value) -> Option<Handle> {
    match value {
        Value::String(text) => text.parse().ok(),
        Value::Number(number) => number.as_u64().map(Handle::new),
        _ => None,
    }
}

impl AlertRecord for RawAlert {
    fn type_tag(&self) -> &str {
        &self.type_tag
    }

    fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn int(&self, field: &str, default: i32) -> i32 {
        self.get(field)
            .and_then(Value::as_i64)
            .and_then(|value| i32::try_from(value).ok())
            .unwrap_or(default)
    }

    fn int64(&self, field: &str, default: i64) -> i64 {
        self.get(field).and_then(Value::as_i64).unwrap_or(default)
    }

    fn handle(&self, field: &str, default: Handle) -> Handle {
        self.get(field).and_then(value_to_handle).unwrap_or(default)
    }

    fn string(&self, field: &str, default: &str) -> String {
        self.get(field)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    fn handle_types(&self, field: &str) -> Option<Vec<HandleType>> {
        let entries = self.get(field)?.as_array()?;
        Some(
            entries
                .iter()
                .filter_map(|entry| {
                    let handle = value_to_handle(entry.get("h")?)?;
                    let code = entry
                        .get("t")
                        .and_then(Value::as_i64)
                        .and_then(|code| i32::try_from(code).ok())
                        .unwrap_or(-1);
                    Some(HandleType {
                        handle,
                        kind: NodeKind::from_code(code),
                    })
                })
                .collect(),
        )
    }
}

/// A user referenced by pending contact requests in the catch-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PendingContactUser {
    #[serde(rename = "u", default)]
    pub user: String,
    #[serde(rename = "m", default)]
    pub email: String,
    #[serde(rename = "n", default)]
    pub name: String,
}

impl PendingContactUser {
    /// Parsed user handle, `UNDEF` when malformed
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.user.parse().unwrap_or(Handle::UNDEF)
    }
}

/// The one-time catch-up response: the last N server-held notifications
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatchupSnapshot {
    /// Raw notifications, oldest first
    #[serde(rename = "c", default)]
    pub alerts: Vec<Value>,
    /// Users referenced by pending contact notifications
    #[serde(rename = "u", default)]
    pub users: Vec<PendingContactUser>,
    /// Seconds since the user last acknowledged the feed
    #[serde(rename = "ltd", default)]
    pub last_seen_delta: Option<i64>,
}

impl CatchupSnapshot {
    /// Parse a catch-up response body
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Records wrapped for ingestion
    pub fn records(&self) -> impl Iterator<Item = RawAlert> + '_ {
        self.alerts.iter().cloned().map(RawAlert::from_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_alert_typed_fields() {
        let handle = Handle::new(0x0000_0102_0304_0506);
        let raw = RawAlert::from_value(json!({
            "t": "put",
            "n": handle.to_string(),
            "c": 2,
            "m": "alice@example.com",
            "f": [{"h": handle.to_string(), "t": 1}, {"t": 0}]
        }));

        assert_eq!(raw.type_tag(), "put");
        assert_eq!(raw.handle("n", Handle::UNDEF), handle);
        assert_eq!(raw.int("c", 0), 2);
        assert_eq!(raw.string("m", ""), "alice@example.com");
        let nodes = raw.handle_types("f").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, NodeKind::Folder);
    }

    #[test]
    fn test_raw_alert_fallbacks() {
        let raw = RawAlert::from_value(json!({"t": "c", "u": "not-a-handle", "c": "x"}));
        assert!(raw.handle("u", Handle::UNDEF).is_undef());
        assert_eq!(raw.int("c", 7), 7);
        assert_eq!(raw.string("m", "fallback"), "fallback");
        assert!(raw.handle_types("f").is_none());
        assert!(!raw.has("m"));
    }

    #[test]
    fn test_non_object_has_empty_tag() {
        let raw = RawAlert::from_value(json!([1, 2, 3]));
        assert_eq!(raw.type_tag(), "");
    }

    #[test]
    fn test_snapshot_parse() {
        let snapshot = CatchupSnapshot::from_json(
            r#"{"c": [{"t": "c"}], "u": [{"u": "AAAAAAAAAAA", "m": "bob@example.com"}], "ltd": 60}"#,
        )
        .unwrap();
        assert_eq!(snapshot.alerts.len(), 1);
        assert_eq!(snapshot.last_seen_delta, Some(60));
        assert_eq!(snapshot.users[0].handle(), Handle::new(0));
        assert_eq!(snapshot.records().count(), 1);
    }
}
