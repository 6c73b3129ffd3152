//! Process-wide progress channel: one value in `[0, 100]`, fanned out to
//! every live subscriber.
//!
//! The channel is an explicit service object: created once at startup,
//! shared as `Arc<ProgressChannel>`, and closed with
//! [`ProgressChannel::shutdown`]. There is a single global value, not one
//! per batch or per user; every subscriber sees the same number.

use std::collections::HashMap;

use hookreel_core::progress::{clamp_percent, ProgressEvent};
use hookreel_core::types::{Percent, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Identifier handed out by [`ProgressChannel::subscribe`].
pub type SubscriberId = u64;

/// Channel sender half for pushing events to one subscriber.
type SubscriberSender = mpsc::UnboundedSender<ProgressEvent>;

/// A live subscription. Dropping the receiver is enough to leave; the
/// next broadcast notices the closed channel and releases the slot.
pub struct ProgressSubscription {
    pub id: SubscriberId,
    pub receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

/// Errors from the progress channel.
#[derive(Debug, thiserror::Error)]
pub enum ProgressChannelError {
    /// The channel has been shut down and accepts no new subscribers.
    #[error("Progress channel is shut down")]
    Closed,
}

struct Subscriber {
    sender: SubscriberSender,
    /// Used by connection monitoring in logs.
    connected_at: Timestamp,
}

struct ChannelState {
    current: Percent,
    subscribers: HashMap<SubscriberId, Subscriber>,
    next_id: SubscriberId,
    open: bool,
}

/// Single-value progress store with broadcast to subscribers.
pub struct ProgressChannel {
    state: RwLock<ChannelState>,
}

impl ProgressChannel {
    /// Create an open channel holding `0`.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ChannelState {
                current: 0,
                subscribers: HashMap::new(),
                next_id: 1,
                open: true,
            }),
        }
    }

    /// Clamp `value` into `[0, 100]`, store it, and push it to every live
    /// subscriber. Subscribers whose delivery fails are dropped; the
    /// broadcast to the others continues. Returns the stored value.
    pub async fn set_progress(&self, value: i64) -> Percent {
        let progress = clamp_percent(value);
        let mut state = self.state.write().await;
        state.current = progress;

        let event = ProgressEvent::new(progress);
        let before = state.subscribers.len();
        state
            .subscribers
            .retain(|_, sub| sub.sender.send(event).is_ok());

        let dropped = before - state.subscribers.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Released disconnected progress subscribers");
        }
        tracing::trace!(progress, subscribers = state.subscribers.len(), "Progress broadcast");
        progress
    }

    /// Set the value back to `0` and broadcast it.
    pub async fn reset(&self) {
        self.set_progress(0).await;
    }

    /// The last stored value.
    pub async fn current(&self) -> Percent {
        self.state.read().await.current
    }

    /// Register a listener. The current value is delivered immediately so
    /// late subscribers never start from a blank slate.
    pub async fn subscribe(&self) -> Result<ProgressSubscription, ProgressChannelError> {
        let mut state = self.state.write().await;
        if !state.open {
            return Err(ProgressChannelError::Closed);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is alive in this scope, so the send cannot fail.
        let _ = sender.send(ProgressEvent::new(state.current));

        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.insert(
            id,
            Subscriber {
                sender,
                connected_at: chrono::Utc::now(),
            },
        );
        tracing::debug!(subscriber_id = id, "Progress subscriber added");

        Ok(ProgressSubscription { id, receiver })
    }

    /// Remove a subscriber. Unknown or already-removed ids are a no-op.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        if let Some(sub) = self.state.write().await.subscribers.remove(&id) {
            let connected_secs = (chrono::Utc::now() - sub.connected_at).num_seconds();
            tracing::debug!(subscriber_id = id, connected_secs, "Progress subscriber removed");
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.subscribers.len()
    }

    /// Close every subscription and refuse new ones.
    ///
    /// Dropping the senders ends each subscriber's stream.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        state.open = false;
        let count = state.subscribers.len();
        state.subscribers.clear();
        tracing::info!(count, "Closed all progress subscriptions");
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn late_subscriber_sees_current_value() {
        let channel = ProgressChannel::new();
        channel.set_progress(37).await;

        let mut sub = channel.subscribe().await.unwrap();
        let first = sub.receiver.recv().await.unwrap();
        assert_eq!(first.progress, 37);
    }

    #[tokio::test]
    async fn values_are_clamped() {
        let channel = ProgressChannel::new();
        assert_eq!(channel.set_progress(150).await, 100);
        assert_eq!(channel.set_progress(-3).await, 0);
        assert_eq!(channel.current().await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let channel = ProgressChannel::new();
        let mut a = channel.subscribe().await.unwrap();
        let mut b = channel.subscribe().await.unwrap();

        channel.set_progress(60).await;

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.receiver.recv().await.unwrap().progress, 0);
            assert_eq!(sub.receiver.recv().await.unwrap().progress, 60);
        }
    }

    #[tokio::test]
    async fn failed_delivery_drops_only_that_subscriber() {
        let channel = ProgressChannel::new();
        let gone = channel.subscribe().await.unwrap();
        let mut alive = channel.subscribe().await.unwrap();
        drop(gone.receiver);

        channel.set_progress(10).await;

        assert_eq!(channel.subscriber_count().await, 1);
        assert_eq!(alive.receiver.recv().await.unwrap().progress, 0);
        assert_eq!(alive.receiver.recv().await.unwrap().progress, 10);
    }

    #[tokio::test]
    async fn repeated_value_is_redelivered_without_other_change() {
        let channel = ProgressChannel::new();
        let mut sub = channel.subscribe().await.unwrap();

        channel.set_progress(25).await;
        channel.set_progress(25).await;

        assert_eq!(sub.receiver.recv().await.unwrap().progress, 0);
        assert_eq!(sub.receiver.recv().await.unwrap().progress, 25);
        assert_eq!(sub.receiver.recv().await.unwrap().progress, 25);
        assert_eq!(channel.current().await, 25);
        assert_eq!(channel.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let channel = ProgressChannel::new();
        let sub = channel.subscribe().await.unwrap();

        channel.unsubscribe(sub.id).await;
        channel.unsubscribe(sub.id).await;
        channel.unsubscribe(9999).await;

        assert_eq!(channel.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn reset_broadcasts_zero() {
        let channel = ProgressChannel::new();
        channel.set_progress(80).await;
        let mut sub = channel.subscribe().await.unwrap();

        channel.reset().await;

        assert_eq!(sub.receiver.recv().await.unwrap().progress, 80);
        assert_eq!(sub.receiver.recv().await.unwrap().progress, 0);
    }

    #[tokio::test]
    async fn shutdown_ends_streams_and_refuses_new_subscribers() {
        let channel = ProgressChannel::new();
        let mut sub = channel.subscribe().await.unwrap();

        channel.shutdown().await;

        assert_eq!(sub.receiver.recv().await.unwrap().progress, 0);
        assert!(sub.receiver.recv().await.is_none());
        assert!(matches!(
            channel.subscribe().await,
            Err(ProgressChannelError::Closed)
        ));
    }
}
