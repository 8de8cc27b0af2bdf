// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! FIFO hand-off between the log receiver and the lifecycle loop.
//!
//! The receiver enqueues one [`RawBatch`] per Logs API delivery, possibly from
//! several connection tasks at once. The lifecycle loop is the only consumer.
//! The queue has no capacity bound: a function that logs faster than Loki
//! accepts will grow it until the environment is frozen or shut down.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::errors::QueueError;

/// One undecoded delivery from the Logs API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBatch(Bytes);

impl RawBatch {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self(payload.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.text().contains(marker)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&'static str> for RawBatch {
    fn from(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for RawBatch {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogQueue {
    inner: Arc<Mutex<VecDeque<RawBatch>>>,
}

impl LogQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // A producer that panicked mid-push cannot leave the deque half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<RawBatch>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, batch: RawBatch) {
        self.lock().push_back(batch);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Removes up to `n` batches from the front of the queue.
    pub fn dequeue(&self, n: usize) -> Result<Vec<RawBatch>, QueueError> {
        if n == 0 {
            return Err(QueueError::InvalidCount);
        }
        let mut queue = self.lock();
        if queue.is_empty() {
            return Err(QueueError::Empty);
        }
        let take = n.min(queue.len());
        Ok(queue.drain(..take).collect())
    }
}
