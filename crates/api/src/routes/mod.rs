pub mod batches;
pub mod health;
pub mod progress;
pub mod uploads;

use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::state::AppState;

/// Request bodies on `/api/v1` may carry inline media.
pub const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /uploads                     store raw bytes, return a blob: handle (POST)
///
/// /batches                     start a batch (POST)
/// /batches/current             running state and last report (GET)
/// /batches/pending             interrupted batch (GET), decline it (DELETE)
/// /batches/resume              resume the interrupted batch (POST)
/// /batches/checkpoint          force-save in-flight state (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/uploads", uploads::router())
        .nest("/batches", batches::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
