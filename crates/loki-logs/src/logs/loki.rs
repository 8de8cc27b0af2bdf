// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Loki push protocol: grouping classified lines into label streams and
//! shipping them in a single `POST /loki/api/v1/push`.
//!
//! One push per batch, no retry. A failed push loses the batch.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, error, Instrument, Span};

use crate::errors::PushError;
use crate::http_utils::build_client;
use crate::logs::constants::{JOB_LABEL, PUSH_PATH};
use crate::logs::processor::ClassifiedLine;

/// Labels shared by every stream of one push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamLabels {
    pub job: String,
    pub function_name: String,
    pub request_id: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stream {
    pub stream: StreamLabels,
    /// `[unix_nanos, line]` pairs, in production order.
    pub values: Vec<[String; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRequest {
    pub streams: Vec<Stream>,
}

impl PushRequest {
    pub fn value_count(&self) -> usize {
        self.streams.iter().map(|s| s.values.len()).sum()
    }
}

/// Groups `lines` into one stream per level, levels in first-seen order.
#[must_use]
pub fn build_push_request(
    lines: Vec<ClassifiedLine>,
    function_name: &str,
    ctx: &InvocationContext,
) -> PushRequest {
    let mut streams: Vec<Stream> = Vec::new();
    let mut index_by_level: HashMap<String, usize> = HashMap::new();

    for line in lines {
        let idx = match index_by_level.get(&line.level) {
            Some(idx) => *idx,
            None => {
                streams.push(Stream {
                    stream: StreamLabels {
                        job: JOB_LABEL.to_string(),
                        function_name: function_name.to_string(),
                        request_id: ctx.request_id.clone(),
                        level: line.level.clone(),
                    },
                    values: Vec::new(),
                });
                index_by_level.insert(line.level, streams.len() - 1);
                streams.len() - 1
            }
        };
        streams[idx]
            .values
            .push([line.timestamp_unix_nanos.to_string(), line.message]);
    }

    PushRequest { streams }
}

#[derive(Debug, Clone)]
pub struct LokiConfig {
    /// Base URL, without the push path.
    pub base_url: String,
    pub auth_token: Option<String>,
    pub function_name: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LokiClient {
    client: reqwest::Client,
    push_url: String,
    headers: HeaderMap,
    function_name: String,
    span: Span,
}

impl LokiClient {
    pub fn new(config: LokiConfig, span: Span) -> Result<Self, PushError> {
        let client = build_client(config.timeout)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.auth_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(PushError::InvalidAuthToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(LokiClient {
            client,
            push_url: format!("{}{PUSH_PATH}", config.base_url.trim_end_matches('/')),
            headers,
            function_name: config.function_name,
            span,
        })
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    /// Ships `lines` in one request. An empty slice is a no-op success.
    pub async fn push(
        &self,
        lines: Vec<ClassifiedLine>,
        ctx: &InvocationContext,
    ) -> Result<(), PushError> {
        if lines.is_empty() {
            return Ok(());
        }
        let request = build_push_request(lines, &self.function_name, ctx);
        self.send(&request).instrument(self.span.clone()).await
    }

    async fn send(&self, request: &PushRequest) -> Result<(), PushError> {
        let body = serde_json::to_vec(request)?;
        let n_streams = request.streams.len();
        let n_values = request.value_count();
        debug!("LOKI | Pushing {n_values} lines in {n_streams} streams");

        let time = std::time::Instant::now();
        let resp = self
            .client
            .post(&self.push_url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;
        let elapsed = time.elapsed();

        match resp.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                debug!(
                    "LOKI | Pushed {n_values} lines in {} ms",
                    elapsed.as_millis()
                );
                Ok(())
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                error!("LOKI | Push rejected with {status}: {body}");
                Err(PushError::Status(status))
            }
        }
    }
}
