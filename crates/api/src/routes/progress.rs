use axum::routing::get;
use axum::Router;

use crate::handlers::progress;
use crate::state::AppState;

/// Progress protocol routes (root level, NOT under `/api/v1`).
///
/// ```text
/// GET    /api/progress    -> stream_progress (text/event-stream)
/// POST   /api/progress    -> publish_progress
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/progress",
        get(progress::stream_progress).post(progress::publish_progress),
    )
}
