// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Drains the ingestion queue into Loki, one batch per push.
//!
//! ```text
//!   LogQueue ──dequeue(1)──> parse_batch ──> LokiClient::push
//!      ^                                         │
//!      └─────── next batch, unless stopped ──────┘
//! ```
//!
//! A regular drain (after an INVOKE event) stops as soon as it has shipped the
//! batch carrying `platform.runtimeDone`. A forced drain (on SHUTDOWN) ignores
//! the marker and empties the queue. Any error ends the drain early and is
//! only logged.

use tracing::{debug, error, Instrument, Span};

use crate::logs::constants::RUNTIME_DONE;
use crate::logs::loki::{InvocationContext, LokiClient};
use crate::logs::processor::parse_batch;
use crate::queue::LogQueue;

/// Why a drain call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStop {
    QueueEmpty,
    RuntimeDone,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    /// Batches removed from the queue, including one that failed.
    pub processed: usize,
    pub stop: DrainStop,
}

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone)]
pub struct LogsFlusher {
    queue: LogQueue,
    loki: LokiClient,
    span: Span,
}

impl LogsFlusher {
    #[must_use]
    pub fn new(queue: LogQueue, loki: LokiClient, span: Span) -> Self {
        LogsFlusher { queue, loki, span }
    }

    /// Batches waiting in the queue.
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    pub async fn drain(&self, force: bool, ctx: &InvocationContext) -> DrainSummary {
        self.drain_inner(force, ctx)
            .instrument(self.span.clone())
            .await
    }

    async fn drain_inner(&self, force: bool, ctx: &InvocationContext) -> DrainSummary {
        let mut processed = 0;
        debug!(
            "LOGS | Draining {} queued batches (force={force})",
            self.queue.len()
        );

        loop {
            if self.queue.is_empty() {
                return DrainSummary {
                    processed,
                    stop: DrainStop::QueueEmpty,
                };
            }

            let batch = match self.queue.dequeue(1) {
                Ok(mut items) => match items.pop() {
                    Some(batch) => batch,
                    None => {
                        return DrainSummary {
                            processed,
                            stop: DrainStop::QueueEmpty,
                        }
                    }
                },
                Err(e) => {
                    error!("LOGS | Failed to dequeue batch: {e}");
                    return DrainSummary {
                        processed,
                        stop: DrainStop::Failed,
                    };
                }
            };
            processed += 1;

            let lines = match parse_batch(&batch) {
                Ok(lines) => lines,
                Err(e) => {
                    error!("LOGS | Dropping batch of {} bytes: {e}", batch.len());
                    return DrainSummary {
                        processed,
                        stop: DrainStop::Failed,
                    };
                }
            };

            let n_lines = lines.len();
            if let Err(e) = self.loki.push(lines, ctx).await {
                error!("LOGS | Failed to push {n_lines} lines, batch dropped: {e}");
                return DrainSummary {
                    processed,
                    stop: DrainStop::Failed,
                };
            }

            if !force && batch.contains(RUNTIME_DONE) {
                debug!(
                    "LOGS | Runtime done, leaving {} batches for the next invocation",
                    self.queue.len()
                );
                return DrainSummary {
                    processed,
                    stop: DrainStop::RuntimeDone,
                };
            }
        }
    }
}
