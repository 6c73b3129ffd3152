//! Handlers for the progress publish/subscribe protocol.
//!
//! `POST /api/progress` sets the global value; `GET /api/progress` is a
//! server-sent event stream that starts with the current value and then
//! emits one `data: {"progress":N}` event per update.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use hookreel_events::{ProgressChannel, SubscriberId};
use serde_json::{json, Value};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Releases the subscription when the client disconnects and the stream
/// is dropped.
struct SubscriptionGuard {
    channel: Arc<ProgressChannel>,
    id: SubscriberId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let channel = Arc::clone(&self.channel);
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { channel.unsubscribe(id).await });
        }
    }
}

/// POST /api/progress
///
/// Body `{ "progress": <number> }`. Fractional values are rounded and the
/// result is clamped into `[0, 100]`.
pub async fn publish_progress(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let progress = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("progress").and_then(Value::as_f64))
        .ok_or_else(|| AppError::BadRequest("Progress must be a number".into()))?;

    let stored = state.progress.set_progress(progress.round() as i64).await;
    tracing::debug!(requested = progress, stored, "Progress published");

    Ok(Json(json!({ "success": true })))
}

/// GET /api/progress
pub async fn stream_progress(
    State(state): State<AppState>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let subscription = state
        .progress
        .subscribe()
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

    let guard = SubscriptionGuard {
        channel: Arc::clone(&state.progress),
        id: subscription.id,
    };
    tracing::debug!(subscriber_id = subscription.id, "Progress stream opened");

    let stream = UnboundedReceiverStream::new(subscription.receiver).map(move |event| {
        let _ = &guard;
        let data = json!({ "progress": event.progress }).to_string();
        Ok::<_, Infallible>(Event::default().data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
