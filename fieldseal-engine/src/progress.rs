//! Live progress feed shared by the batch jobs.
//!
//! A job writes [`ProgressEvent`]s into a bounded channel through a
//! [`ProgressSink`]; the caller pulls them from the matching
//! [`ProgressStream`] as they happen. Dropping the stream is the cancellation
//! signal: the job notices the closed channel at its next record boundary and
//! stops writing.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Progress,
    Complete,
}

/// One step of a job's progress. `current` never decreases within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub current: usize,
    pub total: usize,
    pub fixed_count: usize,
    pub error_count: usize,
    pub message: String,
}

impl ProgressEvent {
    pub fn progress(
        current: usize,
        total: usize,
        fixed_count: usize,
        error_count: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase: ProgressPhase::Progress,
            current,
            total,
            fixed_count,
            error_count,
            message: message.into(),
        }
    }

    pub fn complete(
        total: usize,
        fixed_count: usize,
        error_count: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase: ProgressPhase::Complete,
            current: total,
            total,
            fixed_count,
            error_count,
            message: message.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == ProgressPhase::Complete
    }

    /// Serializes the event as one newline-terminated JSON line.
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Creates a connected sink/stream pair buffering up to `capacity` events.
pub fn progress_channel(capacity: usize) -> (ProgressSink, ProgressStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSink { tx }, ProgressStream { rx })
}

/// Producer half, owned by a running job.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSink {
    /// Delivers an event, waiting for buffer space. Returns `false` once the
    /// consumer has gone away.
    pub async fn emit(&self, event: ProgressEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// True once the consumer has dropped its stream.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half: an ordered, append-only feed of events.
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressStream {
    /// Next event, or `None` once the job has finished and the buffer is
    /// drained.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Drains every remaining event.
    pub async fn collect_all(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Decides which record boundaries produce a progress event.
///
/// A run over `total > 0` items reports once at the start (current 0), after
/// every `interval` items while items remain, and exactly once on
/// completion. An empty run reports only the completion.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cadence {
    interval: usize,
}

impl Cadence {
    pub(crate) fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
        }
    }

    pub(crate) fn reports_start(&self, total: usize) -> bool {
        total > 0
    }

    /// Whether finishing item number `current` (1-based) warrants an
    /// intermediate event. The final item is covered by the completion.
    pub(crate) fn reports_after(&self, current: usize, total: usize) -> bool {
        current < total && current % self.interval == 0
    }
}
