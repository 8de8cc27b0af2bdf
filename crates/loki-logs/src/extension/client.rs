// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lambda Extensions API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::errors::ExtensionApiError;
use crate::http_utils::build_client;

pub const EXTENSION_NAME_HEADER: &str = "Lambda-Extension-Name";
pub const EXTENSION_ID_HEADER: &str = "Lambda-Extension-Identifier";
pub const EXTENSION_ERROR_TYPE_HEADER: &str = "Lambda-Extension-Function-Error-Type";

const API_VERSION: &str = "2020-01-01";
const REGISTER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Invoke,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextEventResponse {
    pub event_type: EventType,
    #[serde(default)]
    pub deadline_ms: u64,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub invoked_function_arn: Option<String>,
    #[serde(default)]
    pub shutdown_reason: Option<String>,
}

/// The calls the lifecycle loop makes against the Extensions API.
#[async_trait]
pub trait LifecycleApi {
    /// Registers for INVOKE and SHUTDOWN events, returning the extension id.
    async fn register(&mut self, name: &str) -> Result<String, ExtensionApiError>;
    /// Blocks until the platform hands out the next event.
    async fn next_event(&self) -> Result<NextEventResponse, ExtensionApiError>;
}

#[derive(Debug, Clone)]
pub struct ExtensionClient {
    base_url: String,
    /// Long-poll client. Each next-event request carries its own timeout.
    client: reqwest::Client,
    register_client: reqwest::Client,
    extension_id: Option<String>,
    next_event_timeout: Duration,
}

impl ExtensionClient {
    pub fn new(
        runtime_api: &str,
        next_event_timeout: Duration,
    ) -> Result<Self, ExtensionApiError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|source| ExtensionApiError::Transport {
                endpoint: "event/next",
                source,
            })?;
        let register_client =
            build_client(REGISTER_TIMEOUT).map_err(|source| ExtensionApiError::Transport {
                endpoint: "register",
                source,
            })?;
        Ok(ExtensionClient {
            base_url: format!("http://{runtime_api}/{API_VERSION}/extension"),
            client,
            register_client,
            extension_id: None,
            next_event_timeout,
        })
    }

    pub fn extension_id(&self) -> Option<&str> {
        self.extension_id.as_deref()
    }

    /// Tells the platform initialization failed. The process should exit afterwards.
    pub async fn init_error(&self, error_type: &str, message: &str) -> Result<(), ExtensionApiError> {
        let endpoint = "init/error";
        let mut request = self
            .register_client
            .post(format!("{}/init/error", self.base_url))
            .header(EXTENSION_ERROR_TYPE_HEADER, error_type)
            .json(&json!({
                "errorMessage": message,
                "errorType": error_type,
                "stackTrace": [],
            }));
        if let Some(id) = &self.extension_id {
            request = request.header(EXTENSION_ID_HEADER, id);
        }
        let resp = request
            .send()
            .await
            .map_err(|source| ExtensionApiError::Transport { endpoint, source })?;
        check_status(endpoint, resp).await.map(|_| ())
    }
}

#[async_trait]
impl LifecycleApi for ExtensionClient {
    async fn register(&mut self, name: &str) -> Result<String, ExtensionApiError> {
        let endpoint = "register";
        let resp = self
            .register_client
            .post(format!("{}/register", self.base_url))
            .header(EXTENSION_NAME_HEADER, name)
            .json(&json!({ "events": ["INVOKE", "SHUTDOWN"] }))
            .send()
            .await
            .map_err(|source| ExtensionApiError::Transport { endpoint, source })?;
        let resp = check_status(endpoint, resp).await?;

        let extension_id = resp
            .headers()
            .get(EXTENSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(ExtensionApiError::MissingExtensionId)?
            .to_string();
        debug!("Registered extension {name} with id {extension_id}");
        self.extension_id = Some(extension_id.clone());
        Ok(extension_id)
    }

    async fn next_event(&self) -> Result<NextEventResponse, ExtensionApiError> {
        let endpoint = "event/next";
        let mut request = self
            .client
            .get(format!("{}/event/next", self.base_url))
            .timeout(self.next_event_timeout);
        if let Some(id) = &self.extension_id {
            request = request.header(EXTENSION_ID_HEADER, id);
        }
        let resp = request.send().await.map_err(|source| {
            if source.is_timeout() {
                ExtensionApiError::Timeout(self.next_event_timeout)
            } else {
                ExtensionApiError::Transport { endpoint, source }
            }
        })?;
        let resp = check_status(endpoint, resp).await?;
        resp.json::<NextEventResponse>()
            .await
            .map_err(|source| ExtensionApiError::InvalidResponse { endpoint, source })
    }
}

async fn check_status(endpoint: &'static str, resp: Response) -> Result<Response, ExtensionApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ExtensionApiError::Status {
        endpoint,
        status,
        body,
    })
}
