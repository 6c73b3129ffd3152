use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCreated {
    /// Ephemeral `blob:` locator. Valid until it expires, is evicted
    /// to make room, or the process restarts.
    pub handle: String,
    pub size: usize,
    pub content_type: String,
}

/// POST /api/v1/uploads
///
/// Store the raw request body and return an ephemeral handle that can be
/// used as a media locator in batch selections.
pub async fn create_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Upload body must not be empty".into()));
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let size = body.len();
    let handle = state.uploads.insert(body.to_vec(), content_type.clone()).await?;

    tracing::info!(handle = %handle, size, content_type = %content_type, "Upload stored");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UploadCreated {
                handle,
                size,
                content_type,
            },
        }),
    ))
}
