// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for every stage of the pipeline.
//!
//! Only [`ConfigError`] and the registration/subscription flavours of
//! [`ExtensionApiError`] are fatal. Everything else is local to one drain call.

use reqwest::StatusCode;

/// Missing or malformed setting, detected before registration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Failure talking to the Extensions API or the Logs API.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionApiError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("register response did not carry a Lambda-Extension-Identifier header")]
    MissingExtensionId,

    #[error("could not decode {endpoint} response: {source}")]
    InvalidResponse {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("no event received within {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,

    #[error("dequeue count must be greater than zero")]
    InvalidCount,
}

/// Batch-level decode failure. The offending batch is always discarded.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("batch is not a JSON array of log entries: {0}")]
    InvalidBatch(#[from] serde_json::Error),

    #[error("invalid timestamp {time:?}: {reason}")]
    InvalidTimestamp { time: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("failed to serialize push request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to reach Loki: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Loki rejected push with status {0}")]
    Status(StatusCode),

    #[error("auth token is not a valid header value: {0}")]
    InvalidAuthToken(#[source] reqwest::header::InvalidHeaderValue),
}
