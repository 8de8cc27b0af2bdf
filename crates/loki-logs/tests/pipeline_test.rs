// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end: Logs API deliveries hit the receiver over HTTP, the lifecycle
//! loop drains them into a mock Loki.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use mockito::{Matcher, Server};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use loki_logs::errors::ExtensionApiError;
use loki_logs::extension::client::{EventType, LifecycleApi, NextEventResponse};
use loki_logs::extension::lifecycle::{Lifecycle, LifecycleExit, LifecycleState};
use loki_logs::logs::flusher::LogsFlusher;
use loki_logs::logs::loki::{LokiClient, LokiConfig};
use loki_logs::logs_api::receiver::LogsReceiver;
use loki_logs::queue::LogQueue;

/// Posts each step's deliveries to the receiver, then hands out its event.
struct PlatformScript {
    receiver_url: String,
    http: reqwest::Client,
    steps: Mutex<VecDeque<(NextEventResponse, Vec<String>)>>,
}

#[async_trait]
impl LifecycleApi for PlatformScript {
    async fn register(&mut self, _name: &str) -> Result<String, ExtensionApiError> {
        Ok("ext-e2e".to_string())
    }

    async fn next_event(&self) -> Result<NextEventResponse, ExtensionApiError> {
        let step = self.steps.lock().await.pop_front();
        let Some((event, deliveries)) = step else {
            return Err(ExtensionApiError::MissingExtensionId);
        };
        for body in deliveries {
            let resp = self
                .http
                .post(&self.receiver_url)
                .body(body)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
        }
        Ok(event)
    }
}

fn invoke(request_id: &str) -> NextEventResponse {
    NextEventResponse {
        event_type: EventType::Invoke,
        deadline_ms: 0,
        request_id: Some(request_id.to_string()),
        invoked_function_arn: None,
        shutdown_reason: None,
    }
}

fn shutdown() -> NextEventResponse {
    NextEventResponse {
        event_type: EventType::Shutdown,
        deadline_ms: 0,
        request_id: None,
        invoked_function_arn: None,
        shutdown_reason: Some("spindown".to_string()),
    }
}

#[tokio::test]
async fn test_logs_flow_from_receiver_to_loki() {
    let mut loki = Server::new_async().await;
    let error_stream = loki
        .mock("POST", "/loki/api/v1/push")
        .match_header("authorization", "Bearer secret")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""function_name":"orders""#.to_string()),
            Matcher::Regex(r#""request_id":"req-1""#.to_string()),
            Matcher::Regex(r#""level":"ERROR""#.to_string()),
            Matcher::Regex("payment declined".to_string()),
        ]))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let shutdown_flush = loki
        .mock("POST", "/loki/api/v1/push")
        .match_body(Matcher::Regex("late line".to_string()))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let queue = LogQueue::new();
    let receiver_shutdown = CancellationToken::new();
    let receiver = LogsReceiver::bind(0, queue.clone(), receiver_shutdown.clone(), Span::none())
        .await
        .unwrap();
    let port = receiver.local_addr().unwrap().port();
    let receiver_handle = tokio::spawn(receiver.serve());

    let client = LokiClient::new(
        LokiConfig {
            base_url: loki.url(),
            auth_token: Some("secret".to_string()),
            function_name: "orders".to_string(),
            timeout: Duration::from_secs(2),
        },
        Span::none(),
    )
    .unwrap();
    let flusher = LogsFlusher::new(queue.clone(), client, Span::none());

    let api = PlatformScript {
        receiver_url: format!("http://127.0.0.1:{port}/"),
        http: reqwest::Client::new(),
        steps: Mutex::new(VecDeque::from(vec![
            (invoke("req-1"), vec![]),
            (
                invoke("req-1"),
                vec![r#"[
                    {"time":"2024-03-01T12:00:00.000Z","type":"function","record":"2024-03-01T12:00:00.000Z\treq-1\tERROR\tpayment declined\n"},
                    {"time":"2024-03-01T12:00:00.100Z","type":"platform.runtimeDone","record":{"requestId":"req-1","status":"success"}}
                ]"#
                .to_string()],
            ),
            (
                shutdown(),
                vec![r#"[{"time":"2024-03-01T12:00:01Z","type":"function","record":"late line"}]"#
                    .to_string()],
            ),
        ])),
    };

    let mut lifecycle = Lifecycle::new(api, flusher, receiver_shutdown.clone(), Span::none());
    assert_eq!(lifecycle.register("loki-logs-extension").await.unwrap(), "ext-e2e");
    assert_eq!(lifecycle.state(), LifecycleState::WaitingForEvent);

    let exit = tokio::time::timeout(
        Duration::from_secs(10),
        lifecycle.run(CancellationToken::new()),
    )
    .await
    .unwrap();

    assert_eq!(exit, LifecycleExit::Shutdown);
    assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    assert!(queue.is_empty());
    assert!(receiver_shutdown.is_cancelled());
    tokio::time::timeout(Duration::from_secs(1), receiver_handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    error_stream.assert_async().await;
    shutdown_flush.assert_async().await;
}

#[tokio::test]
async fn test_signal_exits_without_flushing() {
    let mut loki = Server::new_async().await;
    let push = loki
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let queue = LogQueue::new();
    let receiver_shutdown = CancellationToken::new();
    let receiver = LogsReceiver::bind(0, queue.clone(), receiver_shutdown.clone(), Span::none())
        .await
        .unwrap();
    let port = receiver.local_addr().unwrap().port();
    tokio::spawn(receiver.serve());

    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/"))
        .body(r#"[{"time":"2024-03-01T12:00:00Z","type":"function","record":"queued"}]"#)
        .send()
        .await
        .unwrap();

    let client = LokiClient::new(
        LokiConfig {
            base_url: loki.url(),
            auth_token: None,
            function_name: "orders".to_string(),
            timeout: Duration::from_secs(2),
        },
        Span::none(),
    )
    .unwrap();
    let flusher = LogsFlusher::new(queue.clone(), client, Span::none());

    // no scripted steps: a call to next_event would fail rather than block,
    // so a pre-cancelled token must win the biased select
    let api = PlatformScript {
        receiver_url: format!("http://127.0.0.1:{port}/"),
        http: reqwest::Client::new(),
        steps: Mutex::new(VecDeque::new()),
    };
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut lifecycle = Lifecycle::new(api, flusher, receiver_shutdown.clone(), Span::none());
    let exit = lifecycle.run(cancel).await;

    assert_eq!(exit, LifecycleExit::Cancelled);
    assert_eq!(queue.len(), 1);
    receiver_shutdown.cancel();
    push.assert_async().await;
}
