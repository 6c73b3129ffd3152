//! The batch manager.
//!
//! At most one batch runs at a time. Starting, resuming and declining all
//! go through here so the single-writer rule on the state store holds.
//! The dispatch loop itself runs on a spawned task; the manager keeps its
//! handle and the last finished report.
//!
//! No lock is held while a plan builds, since building fetches every
//! payload. A start first takes the `starting` reservation under the
//! `active` lock; status reads see the reservation and never wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hookreel_core::batch_state::BatchState;
use hookreel_core::error::CoreError;
use hookreel_core::selections::BatchSelections;
use hookreel_events::{EventBus, ProgressChannel};
use hookreel_pipeline::{
    build_batch, BatchPlan, BatchReport, BatchRunner, Checkpointer, DispatchConfig,
    MediaResolver, ResumeController, StateStore, UploadCache,
};
use hookreel_render::{ObjectStore, RenderService};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};

/// Snapshot returned by `GET /api/v1/batches/current`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatus {
    pub running: bool,
    /// Latest checkpoint of the running batch.
    pub state: Option<BatchState>,
    pub last_report: Option<BatchReport>,
}

pub struct BatchManager {
    runner: Arc<BatchRunner>,
    resolver: MediaResolver,
    checkpointer: Arc<Checkpointer>,
    resume: Mutex<ResumeController>,
    active: Mutex<Option<JoinHandle<()>>>,
    /// Set while a start or resume is building its plan.
    starting: AtomicBool,
    last_report: Arc<RwLock<Option<BatchReport>>>,
    cancel: CancellationToken,
}

impl BatchManager {
    pub fn new(
        render: Arc<dyn RenderService>,
        storage: Arc<dyn ObjectStore>,
        store: Arc<dyn StateStore>,
        uploads: Arc<UploadCache>,
        progress: Arc<ProgressChannel>,
        events: Arc<EventBus>,
        config: DispatchConfig,
    ) -> Self {
        let checkpointer = Arc::new(Checkpointer::new(Arc::clone(&store)));
        let runner = BatchRunner::new(
            render,
            Arc::clone(&progress),
            Arc::clone(&events),
            Arc::clone(&checkpointer),
            config,
        );

        Self {
            runner: Arc::new(runner),
            resolver: MediaResolver::new(uploads, storage),
            checkpointer,
            resume: Mutex::new(ResumeController::new(store, events, progress)),
            active: Mutex::new(None),
            starting: AtomicBool::new(false),
            last_report: Arc::new(RwLock::new(None)),
            cancel: CancellationToken::new(),
        }
    }

    /// Look for a batch interrupted by a previous process. Call once at
    /// startup, before serving requests.
    pub async fn init(&self) -> Option<BatchState> {
        self.resume.lock().await.check().await
    }

    pub async fn is_running(&self) -> bool {
        if self.starting.load(Ordering::Acquire) {
            return true;
        }
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Build and dispatch a fresh batch. Returns the number of jobs.
    pub async fn start(&self, selections: &BatchSelections) -> AppResult<u32> {
        let _reservation = self.reserve().await?;
        if self.resume.lock().await.pending().is_some() {
            return Err(AppError::Core(CoreError::Conflict(
                "An interrupted batch is awaiting a resume decision".into(),
            )));
        }

        let plan = build_batch(selections, &self.resolver).await?;
        let total = plan.total();
        *self.active.lock().await = Some(self.spawn(plan, None));
        Ok(total)
    }

    /// Resume the interrupted batch at its saved cursor.
    pub async fn resume(&self, selections: &BatchSelections) -> AppResult<BatchState> {
        let _reservation = self.reserve().await?;
        let saved = self.resume.lock().await.begin_resume()?;

        let built = build_batch(selections, &self.resolver).await;
        let (plan, state) = self
            .resume
            .lock()
            .await
            .complete_resume(saved, built)
            .await?;
        *self.active.lock().await = Some(self.spawn(plan, Some(state.clone())));
        Ok(state)
    }

    /// Decline to resume: the saved batch is dropped.
    pub async fn decline(&self) -> AppResult<BatchState> {
        Ok(self.resume.lock().await.decline().await?)
    }

    pub async fn pending(&self) -> Option<BatchState> {
        self.resume.lock().await.pending().cloned()
    }

    /// Force-save the in-flight state now.
    pub async fn checkpoint(&self) -> AppResult<BatchState> {
        if !self.checkpointer.flush().await {
            return Err(AppError::Core(CoreError::Conflict(
                "No batch is in flight".into(),
            )));
        }
        let latest = self.checkpointer.watch().borrow().clone();
        latest.ok_or_else(|| AppError::Core(CoreError::Conflict("No batch is in flight".into())))
    }

    pub async fn status(&self) -> BatchStatus {
        let state = self.checkpointer.watch().borrow().clone();
        let running = self.is_running().await;
        let last_report = self.last_report.read().await.clone();
        BatchStatus {
            running,
            state,
            last_report,
        }
    }

    /// Stop the running batch, leaving its checkpoint for the next start.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();
        if let Some(handle) = self.active.lock().await.take() {
            if tokio::time::timeout(timeout, handle).await.is_err() {
                tracing::warn!("Batch task did not stop in time");
            }
        }
    }

    /// Claim the right to start a batch. Released when the returned guard
    /// drops, by which time the spawned handle is in `active`.
    async fn reserve(&self) -> AppResult<StartReservation<'_>> {
        let active = self.active.lock().await;
        ensure_idle(&active)?;
        if self.starting.swap(true, Ordering::AcqRel) {
            return Err(AppError::Core(CoreError::Conflict(
                "A batch is already starting".into(),
            )));
        }
        Ok(StartReservation(&self.starting))
    }

    fn spawn(&self, plan: BatchPlan, saved: Option<BatchState>) -> JoinHandle<()> {
        let runner = Arc::clone(&self.runner);
        let last_report = Arc::clone(&self.last_report);
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            let run = async move {
                match saved {
                    Some(state) => runner.resume(&plan, state).await,
                    None => runner.run(&plan).await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Batch interrupted by shutdown; checkpoint kept");
                }
                report = run => {
                    *last_report.write().await = Some(report);
                }
            }
        })
    }
}

struct StartReservation<'a>(&'a AtomicBool);

impl Drop for StartReservation<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn ensure_idle(active: &Option<JoinHandle<()>>) -> AppResult<()> {
    if active.as_ref().is_some_and(|handle| !handle.is_finished()) {
        return Err(AppError::Core(CoreError::Conflict(
            "A batch is already running".into(),
        )));
    }
    Ok(())
}
