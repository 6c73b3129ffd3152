//! Handlers for the `/batches` resource.
//!
//! One batch runs at a time. A batch interrupted by a restart shows up
//! under `/batches/pending` until it is resumed or declined.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hookreel_core::selections::BatchSelections;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAccepted {
    pub total_to_generate: u32,
    pub hook_index: u32,
    pub media_index: u32,
    pub resumed: bool,
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// POST /api/v1/batches
///
/// Validate the selections, resolve every payload, and dispatch the
/// batch in the background. Returns 202 once the batch is running.
pub async fn start_batch(
    State(state): State<AppState>,
    Json(selections): Json<BatchSelections>,
) -> AppResult<impl IntoResponse> {
    let total = state.batches.start(&selections).await?;

    tracing::info!(total, media = selections.media.len(), "Batch accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: BatchAccepted {
                total_to_generate: total,
                hook_index: 0,
                media_index: 0,
                resumed: false,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/batches/current
pub async fn current_batch(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: state.batches.status().await,
    }))
}

// ---------------------------------------------------------------------------
// Resume
// ---------------------------------------------------------------------------

/// GET /api/v1/batches/pending
///
/// The interrupted batch awaiting a decision, or `null`.
pub async fn pending_batch(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: state.batches.pending().await,
    }))
}

/// POST /api/v1/batches/resume
///
/// Resume the interrupted batch with freshly supplied selections. If the
/// inputs are missing the saved batch is discarded and 400 is returned.
pub async fn resume_batch(
    State(state): State<AppState>,
    Json(selections): Json<BatchSelections>,
) -> AppResult<impl IntoResponse> {
    let saved = state.batches.resume(&selections).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: BatchAccepted {
                total_to_generate: saved.total_to_generate,
                hook_index: saved.current_hook_index,
                media_index: saved.current_media_index,
                resumed: true,
            },
        }),
    ))
}

/// DELETE /api/v1/batches/pending
///
/// Decline to resume. The saved batch is cleared and reported abandoned.
pub async fn decline_batch(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let abandoned = state.batches.decline().await?;
    tracing::info!(
        total = abandoned.total_to_generate,
        generated = abandoned.generated_count,
        "Interrupted batch declined",
    );
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// POST /api/v1/batches/checkpoint
///
/// Persist the in-flight state immediately, e.g. when the operator's view
/// is about to go away.
pub async fn checkpoint_batch(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let saved = state.batches.checkpoint().await?;
    Ok(Json(DataResponse { data: saved }))
}
