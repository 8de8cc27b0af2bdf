// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Loki Logs
//!
//! Log forwarding pipeline for a Lambda extension that ships function logs to
//! Grafana Loki.
//!
//! ## Architecture
//!
//! ```text
//!   Lambda Logs API
//!         │  (HTTP push, one batch per delivery)
//!         v
//!   ┌──────────────┐
//!   │ LogsReceiver │  logs_api::receiver
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐
//!   │   LogQueue   │  queue (FIFO, shared)
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐        ┌──────────────┐
//!   │ LogsFlusher  │ <───── │  Lifecycle   │  extension::lifecycle
//!   └──────┬───────┘  drain └──────────────┘
//!          v
//!   ┌──────────────┐
//!   │  processor   │  parse, filter, classify
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐
//!   │  LokiClient  │  group by level, POST /loki/api/v1/push
//!   └──────────────┘
//! ```
//!
//! The receiver is the only producer-side task. Everything downstream of the
//! queue runs sequentially on the lifecycle loop, once per Extensions API event.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod errors;
pub mod extension;
pub mod http_utils;
pub mod logger;
pub mod logs;
pub mod logs_api;
pub mod queue;
