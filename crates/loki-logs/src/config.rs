// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use reqwest::header::HeaderValue;

use crate::errors::ConfigError;
use crate::logs::loki::LokiConfig;

const DEFAULT_RECEIVER_PORT: u16 = 1234;
const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 10;
/// Longest a Lambda invocation may run.
const DEFAULT_NEXT_EVENT_TIMEOUT_SECS: u64 = 900;

#[derive(Debug, Clone)]
pub struct Config {
    /// Loki base URL, without `/loki/api/v1/push`.
    pub loki_push_url: String,
    pub loki_auth_token: Option<String>,
    pub function_name: String,
    /// `host:port` of the Lambda runtime API.
    pub runtime_api: String,
    /// Port the Logs API delivers to on `sandbox.localdomain`.
    pub logs_receiver_port: u16,
    pub push_timeout: Duration,
    /// Upper bound on one next-event long poll.
    pub next_event_timeout: Duration,
}

impl Config {
    pub fn new() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let loki_push_url = lookup("LOKI_PUSH_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("LOKI_PUSH_URL"))?
            .trim()
            .trim_end_matches('/')
            .to_string();

        let runtime_api = lookup("AWS_LAMBDA_RUNTIME_API")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("AWS_LAMBDA_RUNTIME_API"))?;

        let logs_receiver_port = parse_or(
            &lookup,
            "LOKI_LOGS_RECEIVER_PORT",
            DEFAULT_RECEIVER_PORT,
        )?;
        let push_timeout_secs: u64 =
            parse_or(&lookup, "LOKI_PUSH_TIMEOUT_SECS", DEFAULT_PUSH_TIMEOUT_SECS)?;
        let next_event_timeout_secs: u64 = parse_or(
            &lookup,
            "LOKI_NEXT_EVENT_TIMEOUT_SECS",
            DEFAULT_NEXT_EVENT_TIMEOUT_SECS,
        )?;

        let loki_auth_token = lookup("LOKI_AUTH_TOKEN").filter(|v| !v.is_empty());
        if let Some(token) = &loki_auth_token {
            if HeaderValue::from_str(&format!("Bearer {token}")).is_err() {
                return Err(ConfigError::Invalid {
                    name: "LOKI_AUTH_TOKEN",
                    value: "<redacted>".to_string(),
                });
            }
        }

        Ok(Config {
            loki_push_url,
            loki_auth_token,
            function_name: lookup("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_default(),
            runtime_api,
            logs_receiver_port,
            push_timeout: Duration::from_secs(push_timeout_secs),
            next_event_timeout: Duration::from_secs(next_event_timeout_secs),
        })
    }

    pub fn loki(&self) -> LokiConfig {
        LokiConfig {
            base_url: self.loki_push_url.clone(),
            auth_token: self.loki_auth_token.clone(),
            function_name: self.function_name.clone(),
            timeout: self.push_timeout,
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => parse_value(name, &value),
        None => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
