//! Producer-side progress bookkeeping for one batch run.
//!
//! The interpolating ticker and the render completion both write
//! progress. Each job gets an epoch; completing a job bumps the epoch, so
//! a tick carrying the old epoch can never overwrite the job's final
//! value. Values only move forward within a run.

use std::sync::Arc;

use hookreel_core::progress::COMPLETE_PERCENT;
use hookreel_core::types::Percent;
use hookreel_events::ProgressChannel;

/// Identifies the job a progress update belongs to.
pub type JobEpoch = u64;

pub struct ProgressTracker {
    channel: Arc<ProgressChannel>,
    current: Percent,
    epoch: JobEpoch,
}

impl ProgressTracker {
    pub fn new(channel: Arc<ProgressChannel>) -> Self {
        Self {
            channel,
            current: 0,
            epoch: 0,
        }
    }

    pub fn current(&self) -> Percent {
        self.current
    }

    /// Raise progress to `value` outside of any job (setup, resume).
    pub async fn set(&mut self, value: Percent) -> Percent {
        if value > self.current {
            self.current = self.channel.set_progress(i64::from(value)).await;
        }
        self.current
    }

    /// Start a new job and return its epoch.
    pub fn begin_job(&mut self) -> JobEpoch {
        self.epoch += 1;
        self.epoch
    }

    /// Interpolated update from the ticker. Ignored if `epoch` is stale
    /// or `value` would move progress backwards. Returns whether the
    /// value was applied.
    pub async fn advance(&mut self, epoch: JobEpoch, value: Percent) -> bool {
        if epoch != self.epoch || value <= self.current {
            return false;
        }
        self.current = self.channel.set_progress(i64::from(value)).await;
        true
    }

    /// Final value for the job. Closes the epoch.
    pub async fn complete(&mut self, epoch: JobEpoch, value: Percent) {
        if epoch != self.epoch {
            return;
        }
        self.epoch += 1;
        if value > self.current {
            self.current = self.channel.set_progress(i64::from(value)).await;
        }
    }

    /// Jump to 100.
    pub async fn finish(&mut self) -> Percent {
        self.current = self
            .channel
            .set_progress(i64::from(COMPLETE_PERCENT))
            .await;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_tick_cannot_overwrite_completion() {
        let channel = Arc::new(ProgressChannel::new());
        let mut tracker = ProgressTracker::new(channel.clone());

        let epoch = tracker.begin_job();
        assert!(tracker.advance(epoch, 20).await);
        tracker.complete(epoch, 50).await;

        // late tick from the finished job
        assert!(!tracker.advance(epoch, 48).await);
        assert_eq!(channel.current().await, 50);
    }

    #[tokio::test]
    async fn never_moves_backwards() {
        let channel = Arc::new(ProgressChannel::new());
        let mut tracker = ProgressTracker::new(channel.clone());
        tracker.set(40).await;

        let epoch = tracker.begin_job();
        assert!(!tracker.advance(epoch, 30).await);
        tracker.complete(epoch, 35).await;
        assert_eq!(tracker.current(), 40);
        assert_eq!(tracker.set(10).await, 40);
    }

    #[tokio::test]
    async fn finish_reaches_100() {
        let channel = Arc::new(ProgressChannel::new());
        let mut tracker = ProgressTracker::new(channel.clone());
        assert_eq!(tracker.finish().await, 100);
        assert_eq!(channel.current().await, 100);
    }
}
