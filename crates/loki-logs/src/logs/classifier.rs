// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Level heuristic applied to every function log line.
//!
//! Rules, first match wins:
//! 1. The line mentions `level`: read it from a JSON object, or from the third
//!    tab-separated field (the Lambda runtime format `time\trequest\tLEVEL\tmsg`).
//! 2. The line mentions one of `fatal`, `error`, `warn`, `info`, `debug`.
//! 3. `LOGS`.

use serde_json::{Map, Value};

use crate::logs::constants::{DEFAULT_LEVEL, LEVEL_KEYWORDS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub level: String,
    pub message: String,
}

#[must_use]
pub fn classify(text: &str) -> Classification {
    let lowercase = text.to_lowercase();

    if lowercase.contains("level") {
        return match serde_json::from_str::<Map<String, Value>>(text) {
            Ok(object) => from_json_object(&object, text),
            Err(_) => from_tab_fields(text),
        };
    }

    let level = LEVEL_KEYWORDS
        .iter()
        .find(|keyword| lowercase.contains(*keyword))
        .map_or_else(|| DEFAULT_LEVEL.to_string(), |keyword| keyword.to_uppercase());

    Classification {
        level,
        message: text.to_string(),
    }
}

fn from_json_object(object: &Map<String, Value>, text: &str) -> Classification {
    let level = match object.get("level") {
        Some(Value::Number(n)) => format_numeric_level(n),
        Some(Value::String(s)) => s.clone(),
        _ => DEFAULT_LEVEL.to_string(),
    };
    let message = match object.get("message") {
        Some(Value::String(m)) => format!("{level}\t{m}"),
        _ => text.to_string(),
    };
    Classification { level, message }
}

fn format_numeric_level(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    n.as_f64()
        .map_or_else(|| n.to_string(), |f| format!("{f:.0}"))
}

fn from_tab_fields(text: &str) -> Classification {
    let fields: Vec<&str> = text.split('\t').collect();
    if fields.len() > 2 {
        Classification {
            level: fields[2].to_string(),
            message: fields[2..].join("\t"),
        }
    } else {
        Classification {
            level: DEFAULT_LEVEL.to_string(),
            message: text.to_string(),
        }
    }
}
