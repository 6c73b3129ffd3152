//! Shared fakes for the pipeline unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hookreel_core::job::JobSpec;
use hookreel_core::media::{DataUrl, Locator, MediaReference};
use hookreel_core::selections::{BatchSelections, SongSelection};
use hookreel_render::api::RenderApiError;
use hookreel_render::service::{RenderOutcome, RenderService};
use hookreel_render::storage::{ObjectStore, StorageError, StoredObject};

use crate::resolve::MediaResolver;
use crate::uploads::UploadCache;

pub(crate) struct EmptyStore;

#[async_trait]
impl ObjectStore for EmptyStore {
    async fn put(&self, _bytes: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
        Ok("k".into())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        Err(StorageError::NotFound(key.to_string()))
    }
}

pub(crate) fn resolver() -> MediaResolver {
    MediaResolver::new(Arc::new(UploadCache::new()), Arc::new(EmptyStore))
}

/// Inline payload whose bytes are `name`, so tests can tell media apart.
pub(crate) fn inline(name: &str, mime: &str) -> MediaReference {
    let url = DataUrl::new(mime, name.as_bytes().to_vec());
    MediaReference::new(url.kind(), Locator::Inline(url.encode())).with_duration(4.0)
}

pub(crate) fn selections(hooks: &str, media: &[&str]) -> BatchSelections {
    BatchSelections {
        template: Some(inline("t1", "video/mp4")),
        media: media.iter().map(|m| inline(m, "image/png")).collect(),
        song: Some(SongSelection {
            id: "s1".into(),
            payload: inline("s1", "audio/mpeg"),
        }),
        hooks: hooks.into(),
        ..Default::default()
    }
}

pub(crate) fn payload_name(media: &MediaReference) -> String {
    let bytes = DataUrl::parse(media.locator.as_str())
        .map(|url| url.bytes)
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Render service that records every job and fails on chosen call
/// indices.
#[derive(Default)]
pub(crate) struct FakeRender {
    calls: Mutex<Vec<JobSpec>>,
    fail_on: HashSet<usize>,
    delay: Duration,
}

impl FakeRender {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(mut self, call_index: usize) -> Self {
        self.fail_on.insert(call_index);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// `(hook, media)` of every call, in order.
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|job| (job.hook_text.clone(), payload_name(&job.media.payload)))
            .collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RenderService for FakeRender {
    async fn render(&self, job: &JobSpec) -> Result<RenderOutcome, RenderApiError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(job.clone());
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
            video_locator: format!("https://cdn/{}.mp4", job.hook_text),
            expires_at: None,
        })
    }
}
