// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The extension's main loop.
//!
//! ```text
//!   Registering ──> WaitingForEvent ──INVOKE──> drain(false) ──┐
//!                        ^                                     │
//!                        └─────────────────────────────────────┘
//!                        │
//!                        ├──SHUTDOWN──> drain(true), stop receiver ──> Terminated
//!                        ├──signal────> Cancelled (no final drain)
//!                        └──error─────> Failed    (no final drain)
//! ```
//!
//! A next-event call that hits its timeout is not an error: the loop polls again.
//!
//! Lines are labelled with the request id of the most recent INVOKE at the
//! time they are drained, not the invocation that produced them. Batches still
//! queued from an earlier invocation therefore carry the newer id.
//!
//! Only SHUTDOWN guarantees a final forced drain. A termination signal that
//! arrives while waiting for an event exits straight away and whatever is
//! still queued is lost.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::errors::ExtensionApiError;
use crate::extension::client::{EventType, LifecycleApi, NextEventResponse};
use crate::logs::flusher::LogsFlusher;
use crate::logs::loki::InvocationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Registering,
    WaitingForEvent,
    Terminated,
}

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleExit {
    /// SHUTDOWN event handled, queue force-drained.
    Shutdown,
    /// Termination signal while waiting for an event.
    Cancelled,
    /// The next-event call failed.
    Failed,
}

pub struct Lifecycle<L> {
    api: L,
    flusher: LogsFlusher,
    ctx: InvocationContext,
    state: LifecycleState,
    /// Cancelled on SHUTDOWN so the log receiver stops taking deliveries.
    receiver_shutdown: CancellationToken,
    span: Span,
}

impl<L> Lifecycle<L>
where
    L: LifecycleApi + Send + Sync,
{
    pub fn new(
        api: L,
        flusher: LogsFlusher,
        receiver_shutdown: CancellationToken,
        span: Span,
    ) -> Self {
        Lifecycle {
            api,
            flusher,
            ctx: InvocationContext::default(),
            state: LifecycleState::Registering,
            receiver_shutdown,
            span,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn invocation_context(&self) -> &InvocationContext {
        &self.ctx
    }

    pub fn api(&self) -> &L {
        &self.api
    }

    pub async fn register(&mut self, name: &str) -> Result<String, ExtensionApiError> {
        let span = self.span.clone();
        let id = self.api.register(name).instrument(span).await?;
        self.state = LifecycleState::WaitingForEvent;
        Ok(id)
    }

    /// Runs until SHUTDOWN, a failed next-event call, or `cancel`.
    pub async fn run(&mut self, cancel: CancellationToken) -> LifecycleExit {
        let span = self.span.clone();
        let exit = self.run_inner(cancel).instrument(span).await;
        self.state = LifecycleState::Terminated;
        exit
    }

    async fn run_inner(&mut self, cancel: CancellationToken) -> LifecycleExit {
        loop {
            debug!("Waiting for event...");
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(
                        "Cancelled while waiting for an event, exiting without flushing {} queued batches",
                        self.flusher.backlog()
                    );
                    return LifecycleExit::Cancelled;
                }
                event = self.api.next_event() => event,
            };

            let event = match event {
                Ok(event) => event,
                Err(ExtensionApiError::Timeout(waited)) => {
                    debug!("No event within {waited:?}, polling again");
                    continue;
                }
                Err(e) => {
                    error!("Failed to get next event: {e}");
                    info!("Exiting");
                    return LifecycleExit::Failed;
                }
            };

            if self.handle_event(event).await {
                return LifecycleExit::Shutdown;
            }
        }
    }

    /// Returns true once the loop should stop.
    async fn handle_event(&mut self, event: NextEventResponse) -> bool {
        match event.event_type {
            EventType::Invoke => {
                if let Some(request_id) = event.request_id {
                    self.ctx.request_id = request_id;
                }
                debug!("Received INVOKE event for {}", self.ctx.request_id);
                let summary = self.flusher.drain(false, &self.ctx).await;
                debug!("Drain finished: {summary:?}");
                false
            }
            EventType::Shutdown => {
                info!(
                    "Received SHUTDOWN event ({})",
                    event.shutdown_reason.as_deref().unwrap_or("unknown")
                );
                let summary = self.flusher.drain(true, &self.ctx).await;
                debug!("Final drain finished: {summary:?}");
                self.receiver_shutdown.cancel();
                info!("Exiting");
                true
            }
        }
    }
}
