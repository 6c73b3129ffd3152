//! Resume Controller.
//!
//! Decides what happens to a batch persisted by a previous process:
//! `Idle -> CheckingPersisted -> (PromptResume | Clean) -> Resuming -> Idle`.
//! Only the persisted [`BatchState`] is trusted; the inputs needed to
//! rebuild the jobs are supplied again by the caller.

use std::sync::Arc;

use hookreel_core::batch_state::BatchState;
use hookreel_core::selections::BatchSelections;
use hookreel_events::{BatchEvent, BatchEventKind, EventBus, ProgressChannel};
use uuid::Uuid;

use crate::builder::{build_batch, BatchPlan, BuildError};
use crate::resolve::MediaResolver;
use crate::state_store::StateStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePhase {
    Idle,
    CheckingPersisted,
    /// A resumable batch was found and awaits a decision.
    PromptResume(BatchState),
    Clean,
    Resuming,
}

#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    #[error("No interrupted batch is awaiting a decision")]
    NothingPending,

    /// Inputs could not be rebuilt. The saved batch has been discarded.
    #[error("Cannot resume batch: {0}")]
    Inputs(#[from] BuildError),

    /// The rebuilt hook list is shorter than the saved batch.
    #[error("Cannot resume batch: expected {expected} hooks, found {found}")]
    HookMismatch { expected: u32, found: u32 },
}

/// Persisted batches carry no id; their lifecycle events use the nil id.
const PERSISTED_BATCH_ID: Uuid = Uuid::nil();

pub struct ResumeController {
    store: Arc<dyn StateStore>,
    events: Arc<EventBus>,
    progress: Arc<ProgressChannel>,
    phase: ResumePhase,
}

impl ResumeController {
    pub fn new(
        store: Arc<dyn StateStore>,
        events: Arc<EventBus>,
        progress: Arc<ProgressChannel>,
    ) -> Self {
        Self {
            store,
            events,
            progress,
            phase: ResumePhase::Idle,
        }
    }

    pub fn phase(&self) -> &ResumePhase {
        &self.phase
    }

    /// The batch awaiting a decision, if any.
    pub fn pending(&self) -> Option<&BatchState> {
        match &self.phase {
            ResumePhase::PromptResume(state) => Some(state),
            _ => None,
        }
    }

    /// Load persisted state and decide whether to prompt. A finished or
    /// stale record is cleared; a read error counts as no record.
    pub async fn check(&mut self) -> Option<BatchState> {
        self.phase = ResumePhase::CheckingPersisted;

        let loaded = match self.store.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted batch state");
                None
            }
        };

        match loaded {
            Some(state) if state.is_resumable() => {
                tracing::info!(
                    total = state.total_to_generate,
                    generated = state.generated_count,
                    hook_index = state.current_hook_index,
                    media_index = state.current_media_index,
                    "Found interrupted batch",
                );
                self.phase = ResumePhase::PromptResume(state.clone());
                Some(state)
            }
            Some(_) => {
                tracing::debug!("Discarding finished batch state");
                self.clear_store().await;
                self.phase = ResumePhase::Clean;
                None
            }
            None => {
                self.phase = ResumePhase::Clean;
                None
            }
        }
    }

    /// The user does not want to resume: drop the saved batch.
    pub async fn decline(&mut self) -> Result<BatchState, ResumeError> {
        let ResumePhase::PromptResume(state) = std::mem::replace(&mut self.phase, ResumePhase::Idle)
        else {
            return Err(ResumeError::NothingPending);
        };
        self.abandon("resume declined".into()).await;
        Ok(state)
    }

    /// The user wants to resume. Rebuilds the plan from `selections`;
    /// on any failure the saved batch is discarded and reported as
    /// abandoned. On success control passes to the dispatch loop, which
    /// continues at the saved cursor.
    pub async fn accept(
        &mut self,
        selections: &BatchSelections,
        resolver: &MediaResolver,
    ) -> Result<(BatchPlan, BatchState), ResumeError> {
        let state = self.begin_resume()?;
        let built = build_batch(selections, resolver).await;
        self.complete_resume(state, built).await
    }

    /// First half of [`accept`](Self::accept): take the pending batch and
    /// enter `Resuming`. The caller builds the plan, then hands it to
    /// [`complete_resume`](Self::complete_resume).
    pub fn begin_resume(&mut self) -> Result<BatchState, ResumeError> {
        let ResumePhase::PromptResume(state) = &self.phase else {
            return Err(ResumeError::NothingPending);
        };
        let state = state.clone();
        self.phase = ResumePhase::Resuming;
        Ok(state)
    }

    /// Check the rebuilt plan against the saved batch and leave `Resuming`.
    pub async fn complete_resume(
        &mut self,
        state: BatchState,
        built: Result<BatchPlan, BuildError>,
    ) -> Result<(BatchPlan, BatchState), ResumeError> {
        let result = match built {
            Ok(plan) if plan.total() < state.total_to_generate => Err(ResumeError::HookMismatch {
                expected: state.total_to_generate,
                found: plan.total(),
            }),
            Ok(plan) => Ok(plan),
            Err(e) => Err(ResumeError::Inputs(e)),
        };

        self.phase = ResumePhase::Idle;
        match result {
            Ok(plan) => {
                tracing::info!(
                    hook_index = state.current_hook_index,
                    media_index = state.current_media_index,
                    "Resuming interrupted batch",
                );
                Ok((plan, state))
            }
            Err(e) => {
                self.abandon(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn abandon(&self, reason: String) {
        self.clear_store().await;
        self.progress.reset().await;
        tracing::info!(reason = %reason, "Interrupted batch abandoned");
        self.events.publish(BatchEvent::new(
            PERSISTED_BATCH_ID,
            BatchEventKind::BatchAbandoned { reason },
        ));
    }

    async fn clear_store(&self) {
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "Failed to clear batch state");
        }
    }
}
