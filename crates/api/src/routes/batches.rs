use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batches;
use crate::state::AppState;

/// Routes mounted at `/batches`.
///
/// ```text
/// POST   /                -> start_batch
/// GET    /current         -> current_batch
/// GET    /pending         -> pending_batch
/// DELETE /pending         -> decline_batch
/// POST   /resume          -> resume_batch
/// POST   /checkpoint      -> checkpoint_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(batches::start_batch))
        .route("/current", get(batches::current_batch))
        .route(
            "/pending",
            get(batches::pending_batch).delete(batches::decline_batch),
        )
        .route("/resume", post(batches::resume_batch))
        .route("/checkpoint", post(batches::checkpoint_batch))
}
