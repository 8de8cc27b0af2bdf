// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log processing and forwarding to Loki.
//!
//! - [`entry`]: Logs API wire types
//! - [`classifier`]: level heuristic for function lines
//! - [`processor`]: raw batch to ordered [`processor::ClassifiedLine`]s
//! - [`loki`]: stream grouping and the push client
//! - [`flusher`]: queue drain policy

pub mod classifier;
pub mod constants;
pub mod entry;
pub mod flusher;
pub mod loki;
pub mod processor;
