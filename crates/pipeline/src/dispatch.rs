//! Batch Dispatch Loop.
//!
//! Runs the jobs of a [`BatchPlan`] strictly in order, one render in
//! flight at a time. While a render is pending, a ticker interpolates
//! progress from the estimated render time and checkpoints state; the
//! ticker stops the moment the render resolves. A failed job is recorded
//! and the loop moves on.

use std::sync::Arc;
use std::time::Duration;

use hookreel_core::batch_state::{BatchState, JobCursor};
use hookreel_core::estimation::{elapsed_ratio, estimate_job};
use hookreel_core::job::JobSpec;
use hookreel_core::progress::{interpolated, job_completion, job_floor, SETUP_PERCENT};
use hookreel_events::{BatchEvent, BatchEventKind, EventBus, ProgressChannel};
use hookreel_render::api::RenderApiError;
use hookreel_render::service::{RenderOutcome, RenderService};
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::builder::BatchPlan;
use crate::state_store::Checkpointer;
use crate::tracker::{JobEpoch, ProgressTracker};

/// Default interval between interpolation ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    pub tick_interval: Duration,
    /// Upper bound on one render call. `None` waits indefinitely.
    pub render_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            render_timeout: None,
        }
    }
}

/// Why a single job produced no video.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Render(#[from] RenderApiError),

    #[error("Render timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// A job that produced no video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub job_index: u32,
    pub media_index: u32,
    pub error: String,
}

/// Outcome of a finished batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub total: u32,
    pub resumed: bool,
    /// Every video of the batch, including those produced before a resume.
    pub generated_videos: Vec<String>,
    pub failures: Vec<JobFailure>,
}

impl BatchReport {
    pub fn generated_count(&self) -> u32 {
        self.generated_videos.len() as u32
    }
}

/// Executes batches against a render service.
pub struct BatchRunner {
    render: Arc<dyn RenderService>,
    progress: Arc<ProgressChannel>,
    events: Arc<EventBus>,
    checkpointer: Arc<Checkpointer>,
    config: DispatchConfig,
}

impl BatchRunner {
    pub fn new(
        render: Arc<dyn RenderService>,
        progress: Arc<ProgressChannel>,
        events: Arc<EventBus>,
        checkpointer: Arc<Checkpointer>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            render,
            progress,
            events,
            checkpointer,
            config,
        }
    }

    /// Run a fresh batch from job 0.
    pub async fn run(&self, plan: &BatchPlan) -> BatchReport {
        self.execute(plan, BatchState::start(plan.total()), false)
            .await
    }

    /// Continue a persisted batch at its saved cursor. Videos already in
    /// `saved` are kept and never re-rendered.
    pub async fn resume(&self, plan: &BatchPlan, mut saved: BatchState) -> BatchReport {
        saved.is_generating = true;
        self.execute(plan, saved, true).await
    }

    async fn execute(&self, plan: &BatchPlan, mut state: BatchState, resumed: bool) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let total = state.total_to_generate;
        let media_count = plan.media_count().max(1);
        let start = state.cursor();
        let mut failures = Vec::new();

        let mut tracker = ProgressTracker::new(self.progress.clone());
        state.progress_percent = tracker
            .set(state.progress_percent.max(SETUP_PERCENT))
            .await;
        self.checkpointer.save(&state).await;
        self.publish(batch_id, BatchEventKind::BatchStarted { total, resumed });

        tracing::info!(
            %batch_id,
            total,
            resumed,
            hook_index = start.hook_index,
            media_index = start.media_index,
            "Batch dispatch started",
        );

        for job_index in start.hook_index..total {
            let media_index = if job_index == start.hook_index {
                start.media_index % media_count
            } else {
                job_index % media_count
            };
            let Some(job) = plan.job(job_index, media_index) else {
                tracing::error!(job_index, "Plan has no job for hook index");
                break;
            };

            state.set_cursor(JobCursor {
                hook_index: job_index,
                media_index,
            });
            let epoch = tracker.begin_job();
            tracker.advance(epoch, job_floor(job_index, total)).await;
            state.progress_percent = tracker.current();
            self.checkpointer.save(&state).await;
            self.publish(
                batch_id,
                BatchEventKind::JobStarted {
                    job_index,
                    media_index,
                },
            );

            match self
                .render_job(&job, job_index, total, epoch, &mut tracker, &mut state)
                .await
            {
                Ok(outcome) => {
                    tracing::info!(
                        job_index,
                        media_index,
                        video = %outcome.video_locator,
                        "Job rendered",
                    );
                    state.record_video(outcome.video_locator.clone());
                    self.publish(
                        batch_id,
                        BatchEventKind::JobCompleted {
                            job_index,
                            video_locator: outcome.video_locator,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(job_index, media_index, error = %e, "Job failed");
                    self.publish(
                        batch_id,
                        BatchEventKind::JobFailed {
                            job_index,
                            error: e.to_string(),
                        },
                    );
                    failures.push(JobFailure {
                        job_index,
                        media_index,
                        error: e.to_string(),
                    });
                }
            }

            tracker
                .complete(epoch, job_completion(job_index, total))
                .await;
            state.progress_percent = tracker.current();
            state.set_cursor(JobCursor {
                hook_index: job_index + 1,
                media_index: (job_index + 1) % media_count,
            });
            self.checkpointer.save(&state).await;
        }

        state.progress_percent = tracker.finish().await;
        state.is_generating = false;
        self.checkpointer.clear().await;

        let report = BatchReport {
            batch_id,
            total,
            resumed,
            generated_videos: state.generated_videos,
            failures,
        };
        self.publish(
            batch_id,
            BatchEventKind::BatchCompleted {
                generated: report.generated_count(),
                failed: report.failures.len() as u32,
            },
        );
        tracing::info!(
            %batch_id,
            generated = report.generated_count(),
            failed = report.failures.len(),
            "Batch dispatch finished",
        );
        report
    }

    /// Await one render while the ticker interpolates and checkpoints.
    async fn render_job(
        &self,
        job: &JobSpec,
        job_index: u32,
        total: u32,
        epoch: JobEpoch,
        tracker: &mut ProgressTracker,
        state: &mut BatchState,
    ) -> Result<RenderOutcome, JobError> {
        let estimate = estimate_job(job);
        let started = Instant::now();
        let tick = self.config.tick_interval;
        let mut ticker = tokio::time::interval_at(started + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let render = async {
            match self.config.render_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.render.render(job)).await {
                    Ok(result) => result.map_err(JobError::from),
                    Err(_) => Err(JobError::TimedOut(limit)),
                },
                None => self.render.render(job).await.map_err(JobError::from),
            }
        };
        tokio::pin!(render);

        tracing::debug!(job_index, estimate_ms = estimate.as_millis() as u64, "Rendering job");

        loop {
            tokio::select! {
                biased;
                result = &mut render => return result,
                _ = ticker.tick() => {
                    let ratio = elapsed_ratio(started.elapsed(), estimate);
                    tracker.advance(epoch, interpolated(job_index, total, ratio)).await;
                    state.progress_percent = tracker.current();
                    self.checkpointer.save(state).await;
                }
            }
        }
    }

    fn publish(&self, batch_id: Uuid, kind: BatchEventKind) {
        self.events.publish(BatchEvent::new(batch_id, kind));
    }
}

#[cfg(test)]
mod tests {
    use hookreel_events::ProgressSubscription;

    use super::*;
    use crate::builder::build_batch;
    use crate::state_store::{MemoryStateStore, StateStore};
    use crate::test_support::{resolver, selections, FakeRender};

    struct Harness {
        render: Arc<FakeRender>,
        progress: Arc<ProgressChannel>,
        events: Arc<EventBus>,
        store: Arc<MemoryStateStore>,
        checkpointer: Arc<Checkpointer>,
    }

    impl Harness {
        fn new(render: FakeRender) -> Self {
            let store = Arc::new(MemoryStateStore::new());
            Self {
                render: Arc::new(render),
                progress: Arc::new(ProgressChannel::new()),
                events: Arc::new(EventBus::default()),
                checkpointer: Arc::new(Checkpointer::new(store.clone())),
                store,
            }
        }

        fn runner(&self, config: DispatchConfig) -> BatchRunner {
            BatchRunner::new(
                self.render.clone(),
                self.progress.clone(),
                self.events.clone(),
                self.checkpointer.clone(),
                config,
            )
        }
    }

    async fn plan(hooks: &str, media: &[&str]) -> BatchPlan {
        build_batch(&selections(hooks, media), &resolver())
            .await
            .unwrap()
    }

    fn drain(sub: &mut ProgressSubscription) -> Vec<u8> {
        let mut values = Vec::new();
        while let Ok(event) = sub.receiver.try_recv() {
            values.push(event.progress);
        }
        values
    }

    #[tokio::test(start_paused = true)]
    async fn two_hooks_one_media() {
        let h = Harness::new(FakeRender::new());
        let report = h
            .runner(DispatchConfig::default())
            .run(&plan("Hi\nBye", &["m1"]).await)
            .await;

        assert_eq!(
            h.render.calls(),
            vec![("Hi".into(), "m1".into()), ("Bye".into(), "m1".into())]
        );
        assert_eq!(report.generated_videos.len(), 2);
        assert!(report.failures.is_empty());
        assert_eq!(h.progress.current().await, 100);
        assert!(h.store.load().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn media_wraps_around_in_dispatch_order() {
        let h = Harness::new(FakeRender::new());
        h.runner(DispatchConfig::default())
            .run(&plan("A\nB\nC", &["m1", "m2"]).await)
            .await;

        assert_eq!(
            h.render.calls(),
            vec![
                ("A".into(), "m1".into()),
                ("B".into(), "m2".into()),
                ("C".into(), "m1".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_does_not_abort_batch() {
        let h = Harness::new(FakeRender::new().failing_on(1));
        let mut events = h.events.subscribe();

        let report = h
            .runner(DispatchConfig::default())
            .run(&plan("A\nB\nC", &["m1"]).await)
            .await;

        assert_eq!(h.render.call_count(), 3);
        assert_eq!(report.generated_count(), 2);
        assert_eq!(
            report.generated_videos,
            vec!["https://cdn/A.mp4", "https://cdn/C.mp4"]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].job_index, 1);
        assert!(report.failures[0].error.contains("500"));

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let BatchEventKind::JobFailed { job_index, .. } = event.kind {
                assert_eq!(job_index, 1);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_monotonic_and_ends_at_100() {
        let h = Harness::new(FakeRender::new().with_delay(Duration::from_secs(4)));
        let mut sub = h.progress.subscribe().await.unwrap();

        h.runner(DispatchConfig::default())
            .run(&plan("A\nB\nC", &["m1", "m2"]).await)
            .await;

        let values = drain(&mut sub);
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{values:?}");
        assert_eq!(values.last(), Some(&100));
        // interpolation produced values strictly inside the first band
        assert!(values.iter().any(|v| *v > 5 && *v < 35), "{values:?}");
        assert!(values[..values.len() - 1].iter().all(|v| *v <= 95));
    }

    #[tokio::test(start_paused = true)]
    async fn render_timeout_is_a_job_failure() {
        let h = Harness::new(FakeRender::new().with_delay(Duration::from_secs(30)));
        let config = DispatchConfig {
            render_timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        };

        let report = h.runner(config).run(&plan("A", &["m1"]).await).await;

        assert_eq!(report.generated_count(), 0);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("timed out"));
        assert_eq!(h.progress.current().await, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn checkpoints_while_render_in_flight() {
        let h = Harness::new(FakeRender::new().with_delay(Duration::from_secs(5)));
        let plan = plan("A\nB", &["m1", "m2"]).await;
        let latest = h.checkpointer.watch();

        let runner = h.runner(DispatchConfig::default());
        let task = tokio::spawn(async move { runner.run(&plan).await });

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        let saved = h.store.load().await.unwrap().expect("state persisted mid-render");
        assert!(saved.is_generating);
        assert_eq!(saved.cursor(), JobCursor::START);
        assert_eq!(saved.generated_count, 0);
        assert_eq!(latest.borrow().as_ref().map(|s| s.total_to_generate), Some(2));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let saved = h.store.load().await.unwrap().expect("state persisted mid-render");
        assert_eq!(saved.cursor(), JobCursor { hook_index: 1, media_index: 1 });
        assert_eq!(saved.generated_videos, vec!["https://cdn/A.mp4"]);

        let report = task.await.unwrap();
        assert_eq!(report.generated_count(), 2);
        assert!(h.store.load().await.unwrap().is_none());
    }

    /// Keeps every snapshot the loop persists.
    #[derive(Default)]
    struct RecordingStore {
        saved: std::sync::Mutex<Vec<BatchState>>,
        cleared: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl StateStore for RecordingStore {
        async fn save(&self, state: &BatchState) -> Result<(), crate::StateStoreError> {
            self.saved.lock().unwrap().push(state.clone());
            Ok(())
        }

        async fn load(&self) -> Result<Option<BatchState>, crate::StateStoreError> {
            Ok(self.saved.lock().unwrap().last().cloned())
        }

        async fn clear(&self) -> Result<(), crate::StateStoreError> {
            self.cleared.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_checkpoint_keeps_counts_consistent_and_monotonic() {
        let store = Arc::new(RecordingStore::default());
        let runner = BatchRunner::new(
            Arc::new(FakeRender::new().failing_on(1).with_delay(Duration::from_secs(2))),
            Arc::new(ProgressChannel::new()),
            Arc::new(EventBus::default()),
            Arc::new(Checkpointer::new(store.clone())),
            DispatchConfig::default(),
        );

        let report = runner.run(&plan("A\nB\nC", &["m1", "m2"]).await).await;
        assert_eq!(report.generated_count(), 2);
        assert_eq!(report.failures.len(), 1);

        let saved = store.saved.lock().unwrap().clone();
        // batch start, then a start and an end save per job, plus ticks
        assert!(saved.len() > 7, "only {} checkpoints", saved.len());

        for state in &saved {
            assert_eq!(state.total_to_generate, 3);
            assert!(state.generated_count <= state.total_to_generate);
            assert_eq!(state.generated_videos.len() as u32, state.generated_count);
            assert!(state.current_hook_index <= state.total_to_generate);
            assert!(state.validate().is_ok());
        }
        for pair in saved.windows(2) {
            assert!(pair[1].generated_count >= pair[0].generated_count);
            assert!(pair[1].progress_percent >= pair[0].progress_percent);
            assert!(pair[1].current_hook_index >= pair[0].current_hook_index);
        }

        let last = saved.last().unwrap();
        assert_eq!(last.generated_count, 2);
        assert_eq!(last.current_hook_index, 3);
        assert!(store.cleared.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn resume_continues_from_saved_cursor() {
        let h = Harness::new(FakeRender::new());
        let mut saved = BatchState::start(3);
        saved.record_video("https://cdn/A.mp4");
        saved.set_cursor(JobCursor { hook_index: 1, media_index: 1 });
        saved.progress_percent = 35;

        let report = h
            .runner(DispatchConfig::default())
            .resume(&plan("A\nB\nC", &["m1", "m2"]).await, saved)
            .await;

        assert_eq!(
            h.render.calls(),
            vec![("B".into(), "m2".into()), ("C".into(), "m1".into())]
        );
        assert_eq!(
            report.generated_videos,
            vec!["https://cdn/A.mp4", "https://cdn/B.mp4", "https://cdn/C.mp4"]
        );
        assert!(report.resumed);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_uses_saved_media_offset_for_first_job_only() {
        let h = Harness::new(FakeRender::new());
        let mut saved = BatchState::start(3);
        saved.set_cursor(JobCursor { hook_index: 1, media_index: 0 });

        h.runner(DispatchConfig::default())
            .resume(&plan("A\nB\nC", &["m1", "m2"]).await, saved)
            .await;

        assert_eq!(
            h.render.calls(),
            vec![("B".into(), "m1".into()), ("C".into(), "m1".into())]
        );
    }
}
