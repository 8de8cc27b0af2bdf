// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns one raw Logs API delivery into classified lines.
//!
//! A batch either yields all of its function lines or nothing: one bad
//! timestamp discards the lines already built for that batch.

use chrono::DateTime;
use tracing::{debug, trace};

use crate::errors::ParseError;
use crate::logs::classifier::classify;
use crate::logs::entry::{EntryType, LogEntry};
use crate::queue::RawBatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub timestamp_unix_nanos: i64,
    pub level: String,
    pub message: String,
}

/// Decodes `batch` and classifies its `function` entries, in order.
///
/// The forwarded message is not the record verbatim: one trailing `\n` or
/// `\r\n` is stripped before classification, and the classifier may rewrite
/// JSON lines as `<level>\t<message>`.
pub fn parse_batch(batch: &RawBatch) -> Result<Vec<ClassifiedLine>, ParseError> {
    let entries: Vec<LogEntry> = serde_json::from_slice(batch.as_bytes())?;
    let mut lines = Vec::with_capacity(entries.len());

    for entry in entries {
        trace!("LOGS | entry type={:?} time={}", entry.entry_type, entry.time);
        if entry.entry_type != EntryType::Function {
            continue;
        }
        let Some(text) = entry.record.to_text() else {
            debug!("LOGS | Skipping null function record");
            continue;
        };
        let timestamp_unix_nanos = parse_timestamp(&entry.time)?;
        let classification = classify(strip_line_terminator(&text));
        lines.push(ClassifiedLine {
            timestamp_unix_nanos,
            level: classification.level,
            message: classification.message,
        });
    }

    Ok(lines)
}

fn parse_timestamp(time: &str) -> Result<i64, ParseError> {
    let parsed = DateTime::parse_from_rfc3339(time).map_err(|e| ParseError::InvalidTimestamp {
        time: time.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .timestamp_nanos_opt()
        .ok_or_else(|| ParseError::InvalidTimestamp {
            time: time.to_string(),
            reason: "out of range for nanosecond precision".to_string(),
        })
}

fn strip_line_terminator(text: &str) -> &str {
    text.strip_suffix('\n')
        .map(|t| t.strip_suffix('\r').unwrap_or(t))
        .unwrap_or(text)
}
