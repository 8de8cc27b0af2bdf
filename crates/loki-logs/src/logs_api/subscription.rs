// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::errors::ExtensionApiError;
use crate::extension::client::EXTENSION_ID_HEADER;
use crate::http_utils::build_client;

const LOGS_API_VERSION: &str = "2020-08-15";
const SCHEMA_VERSION: &str = "2021-03-18";
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Hostname the sandbox resolves to the extension's own listener.
const SANDBOX_HOSTNAME: &str = "sandbox.localdomain";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffering {
    pub max_items: u32,
    pub max_bytes: u32,
    pub timeout_ms: u32,
}

impl Default for Buffering {
    fn default() -> Self {
        Buffering {
            max_items: 1000,
            max_bytes: 262_144,
            timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Destination {
    pub protocol: &'static str,
    #[serde(rename = "URI")]
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub schema_version: &'static str,
    pub types: Vec<&'static str>,
    pub buffering: Buffering,
    pub destination: Destination,
}

impl SubscriptionRequest {
    /// Platform and function logs, delivered over HTTP to `port` in the sandbox.
    pub fn for_port(port: u16) -> Self {
        SubscriptionRequest {
            schema_version: SCHEMA_VERSION,
            types: vec!["platform", "function"],
            buffering: Buffering::default(),
            destination: Destination {
                protocol: "HTTP",
                uri: format!("http://{SANDBOX_HOSTNAME}:{port}"),
            },
        }
    }
}

/// Subscribes the extension to the Logs API. Deliveries start only after this succeeds.
pub async fn subscribe_logs(
    runtime_api: &str,
    extension_id: &str,
    request: &SubscriptionRequest,
) -> Result<(), ExtensionApiError> {
    let endpoint = "logs";
    let client = build_client(SUBSCRIBE_TIMEOUT)
        .map_err(|source| ExtensionApiError::Transport { endpoint, source })?;
    let url = format!("http://{runtime_api}/{LOGS_API_VERSION}/logs");

    let resp = client
        .put(&url)
        .header(EXTENSION_ID_HEADER, extension_id)
        .json(request)
        .send()
        .await
        .map_err(|source| ExtensionApiError::Transport { endpoint, source })?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ExtensionApiError::Status {
            endpoint,
            status,
            body,
        });
    }
    debug!("Subscribed to Logs API, deliveries go to {}", request.destination.uri);
    Ok(())
}
