//! In-process batch lifecycle bus backed by a `tokio::sync::broadcast`
//! channel.
//!
//! [`EventBus`] carries [`BatchEvent`]s: the transient notifications a
//! user sees while a batch runs (job failures included). It is shared via
//! `Arc<EventBus>` between the dispatch loop and whoever reports to users.

use chrono::Utc;
use hookreel_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BatchEvent
// ---------------------------------------------------------------------------

/// What happened during a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEventKind {
    BatchStarted {
        total: u32,
        resumed: bool,
    },
    JobStarted {
        job_index: u32,
        media_index: u32,
    },
    JobCompleted {
        job_index: u32,
        video_locator: String,
    },
    /// A single job failed; the batch carries on.
    JobFailed {
        job_index: u32,
        error: String,
    },
    BatchCompleted {
        generated: u32,
        failed: u32,
    },
    BatchAbandoned {
        reason: String,
    },
}

/// A batch lifecycle event with its envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEvent {
    pub batch_id: Uuid,
    #[serde(flatten)]
    pub kind: BatchEventKind,
    pub timestamp: Timestamp,
}

impl BatchEvent {
    pub fn new(batch_id: Uuid, kind: BatchEventKind) -> Self {
        Self {
            batch_id,
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Dot-separated name used in logs, e.g. `"batch.job_failed"`.
    pub fn name(&self) -> &'static str {
        match self.kind {
            BatchEventKind::BatchStarted { .. } => "batch.started",
            BatchEventKind::JobStarted { .. } => "batch.job_started",
            BatchEventKind::JobCompleted { .. } => "batch.job_completed",
            BatchEventKind::JobFailed { .. } => "batch.job_failed",
            BatchEventKind::BatchCompleted { .. } => "batch.completed",
            BatchEventKind::BatchAbandoned { .. } => "batch.abandoned",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`BatchEvent`].
pub struct EventBus {
    sender: broadcast::Sender<BatchEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: BatchEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Log every event on the bus until the bus is dropped.
///
/// Job failures are logged at `warn`, everything else at `info`.
pub async fn log_events(mut rx: broadcast::Receiver<BatchEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match &event.kind {
                BatchEventKind::JobFailed { job_index, error } => {
                    tracing::warn!(
                        batch_id = %event.batch_id,
                        job_index,
                        error = %error,
                        "{}",
                        event.name(),
                    );
                }
                BatchEventKind::BatchAbandoned { reason } => {
                    tracing::warn!(batch_id = %event.batch_id, reason = %reason, "{}", event.name());
                }
                _ => {
                    tracing::info!(batch_id = %event.batch_id, kind = ?event.kind, "{}", event.name());
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Batch event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
