// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire types of a Logs API delivery.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// One element of the JSON array the platform posts to the receiver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogEntry {
    /// RFC3339 timestamp with nanosecond precision.
    pub time: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub record: Record,
}

/// Source of a log entry.
///
/// The platform sends its own events as `platform.<event>`; they all map to
/// [`EntryType::Platform`] with the full type name kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryType {
    Function,
    Extension,
    Platform(String),
}

impl<'de> Deserialize<'de> for EntryType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "function" => EntryType::Function,
            "extension" => EntryType::Extension,
            _ => EntryType::Platform(raw),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Text(String),
    Object(Map<String, Value>),
    /// Numbers, arrays, booleans and null.
    Other(Value),
}

impl Record {
    /// Text form of the record: strings verbatim, anything else as compact
    /// JSON. A null record has no text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Record::Text(text) => Some(text.clone()),
            Record::Object(map) => serde_json::to_string(map).ok(),
            Record::Other(Value::Null) => None,
            Record::Other(value) => serde_json::to_string(value).ok(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_function_entry() {
        let entry: LogEntry = serde_json::from_str(
            r#"{"time":"2024-03-01T12:00:00.123456789Z","type":"function","record":"hello\n"}"#,
        )
        .unwrap();
        assert_eq!(entry.entry_type, EntryType::Function);
        assert_eq!(entry.record, Record::Text("hello\n".to_string()));
    }

    #[test]
    fn test_deserialize_platform_entry() {
        let entry: LogEntry = serde_json::from_str(
            r#"{"time":"2024-03-01T12:00:00Z","type":"platform.runtimeDone","record":{"requestId":"abc","status":"success"}}"#,
        )
        .unwrap();
        assert_eq!(
            entry.entry_type,
            EntryType::Platform("platform.runtimeDone".to_string())
        );
        assert!(matches!(entry.record, Record::Object(_)));
    }

    #[test]
    fn test_object_record_to_compact_json() {
        let record: Record = serde_json::from_str(r#"{ "a" : 1 }"#).unwrap();
        assert_eq!(record.to_text().unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_scalar_and_array_records_to_compact_json() {
        let record: Record = serde_json::from_str("42").unwrap();
        assert_eq!(record, Record::Other(Value::from(42)));
        assert_eq!(record.to_text().unwrap(), "42");

        let record: Record = serde_json::from_str("[1, true, \"x\"]").unwrap();
        assert_eq!(record.to_text().unwrap(), r#"[1,true,"x"]"#);
    }

    #[test]
    fn test_null_record_has_no_text() {
        let record: Record = serde_json::from_str("null").unwrap();
        assert_eq!(record, Record::Other(Value::Null));
        assert!(record.to_text().is_none());
    }
}
