#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use hookreel_core::job::JobSpec;
use hookreel_core::media::DataUrl;
use hookreel_pipeline::MemoryStateStore;
use hookreel_render::{ObjectStore, RenderApiError, RenderOutcome, RenderService, StorageError, StoredObject};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use hookreel_api::config::ServerConfig;
use hookreel_api::router::build_app_router;
use hookreel_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a 30-second request timeout and a fast progress tick.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        render_service_url: "http://render.invalid".to_string(),
        render_timeout_secs: 0,
        storage_url: "http://storage.invalid".to_string(),
        state_path: PathBuf::from("unused.json"),
        progress_tick_ms: 50,
        upload_cache_max_bytes: 1024 * 1024,
        upload_ttl_secs: 3600,
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Render service that records `(hook, media bytes)` per call.
#[derive(Default)]
pub struct FakeRender {
    calls: Mutex<Vec<(String, String)>>,
    fail_on: HashSet<usize>,
    delay: Duration,
}

impl FakeRender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, call_index: usize) -> Self {
        self.fail_on.insert(call_index);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderService for FakeRender {
    async fn render(&self, job: &JobSpec) -> Result<RenderOutcome, RenderApiError> {
        let media = DataUrl::parse(job.media.payload.locator.as_str())
            .map(|url| String::from_utf8_lossy(&url.bytes).into_owned())
            .unwrap_or_default();
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((job.hook_text.clone(), media));
            calls.len() - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_on.contains(&index) {
            return Err(RenderApiError::ApiError {
                status: 500,
                body: "render crashed".into(),
            });
        }
        Ok(RenderOutcome {
            video_locator: format!("https://cdn.test/{}.mp4", job.hook_text),
            expires_at: None,
        })
    }
}

/// Object store with nothing in it.
pub struct EmptyObjectStore;

#[async_trait]
impl ObjectStore for EmptyObjectStore {
    async fn put(&self, _bytes: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
        Ok("unused".into())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        Err(StorageError::NotFound(key.to_string()))
    }
}

/// Object store whose reads take `delay` before returning a PNG.
pub struct SlowObjectStore {
    pub delay: Duration,
}

#[async_trait]
impl ObjectStore for SlowObjectStore {
    async fn put(&self, _bytes: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
        Ok("unused".into())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        tokio::time::sleep(self.delay).await;
        Ok(StoredObject {
            bytes: key.as_bytes().to_vec(),
            content_type: "image/png".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// App builders
// ---------------------------------------------------------------------------

/// Build the full application router (same middleware stack as
/// production) around the given render fake and an empty state store.
pub fn build_test_app(render: Arc<FakeRender>) -> (Router, AppState) {
    build_test_app_with_store(render, Arc::new(MemoryStateStore::new()))
}

pub fn build_test_app_with_store(
    render: Arc<FakeRender>,
    store: Arc<MemoryStateStore>,
) -> (Router, AppState) {
    build_test_app_with(test_config(), render, Arc::new(EmptyObjectStore), store)
}

pub fn build_test_app_with_storage(
    render: Arc<FakeRender>,
    storage: Arc<dyn ObjectStore>,
) -> (Router, AppState) {
    build_test_app_with(test_config(), render, storage, Arc::new(MemoryStateStore::new()))
}

pub fn build_test_app_with(
    config: ServerConfig,
    render: Arc<FakeRender>,
    storage: Arc<dyn ObjectStore>,
    store: Arc<MemoryStateStore>,
) -> (Router, AppState) {
    let state = AppState::new(config.clone(), render, storage, store);
    let app = build_app_router(state.clone(), &config);
    (app, state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    post_raw(app, uri, "application/json", body.to_string().into_bytes()).await
}

pub async fn post_raw(
    app: &Router,
    uri: &str,
    content_type: &str,
    body: impl Into<Body>,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type)
        .body(body.into())
        .unwrap();
    send(app, request).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll until no batch is running. Panics after five seconds.
pub async fn wait_for_idle(state: &AppState) {
    for _ in 0..500 {
        if !state.batches.is_running().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("batch did not finish in time");
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

/// Inline media reference whose bytes are `name`.
pub fn inline_media(name: &str, mime: &str) -> Value {
    json!({
        "kind": if mime.starts_with("video/") { "video" } else { "image" },
        "locator": DataUrl::new(mime, name.as_bytes().to_vec()).encode(),
        "durationSeconds": 4.0,
    })
}

/// Complete selections with inline payloads.
pub fn selections(hooks: &str, media: &[&str]) -> Value {
    json!({
        "template": inline_media("template", "video/mp4"),
        "media": media.iter().map(|m| inline_media(m, "image/png")).collect::<Vec<_>>(),
        "song": { "id": "song-1", "payload": inline_media("song", "audio/mpeg") },
        "hooks": hooks,
    })
}
