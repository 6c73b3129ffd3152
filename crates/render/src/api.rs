//! REST client for the Render Service.
//!
//! Maps a [`JobSpec`] onto the `POST /api/create-video` request body and
//! reads back the produced video locator.

use async_trait::async_trait;
use hookreel_core::job::{DurationRange, HookPosition, JobSpec, TemplatePosition};
use hookreel_core::media::MediaKind;
use serde::Serialize;

use crate::service::{RenderOutcome, RenderService};

/// HTTP client for a single Render Service instance.
pub struct RenderApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the Render Service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum RenderApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The Render Service returned a non-2xx status code.
    #[error("Render service error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HookBody<'a> {
    text: &'a str,
    style: u8,
    position: HookPosition,
    offset: i32,
}

#[derive(Debug, Serialize)]
struct TemplateBody<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    kind: MediaKind,
    position: TemplatePosition,
    duration: DurationRange,
}

#[derive(Debug, Serialize)]
struct MediaBody<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    kind: MediaKind,
}

#[derive(Debug, Serialize)]
struct SongBody<'a> {
    id: &'a str,
    url: &'a str,
}

/// Wire body of `POST /api/create-video`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVideoRequest<'a> {
    hook: HookBody<'a>,
    part1: TemplateBody<'a>,
    part2: MediaBody<'a>,
    part2_duration: DurationRange,
    song: SongBody<'a>,
}

impl<'a> CreateVideoRequest<'a> {
    fn from_job(job: &'a JobSpec) -> Self {
        Self {
            hook: HookBody {
                text: &job.hook_text,
                style: job.style.variant,
                position: job.style.position,
                offset: job.style.vertical_offset_px,
            },
            part1: TemplateBody {
                url: job.template.payload.locator.as_str(),
                kind: job.template.payload.kind,
                position: job.template.position,
                duration: job.template.duration_range,
            },
            part2: MediaBody {
                url: job.media.payload.locator.as_str(),
                kind: job.media.payload.kind,
            },
            part2_duration: job.media.duration_range,
            song: SongBody {
                id: &job.song.id,
                url: job.song.payload.locator.as_str(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl RenderApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8080`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Submit one job and wait for the rendered video.
    pub async fn create_video(&self, job: &JobSpec) -> Result<RenderOutcome, RenderApiError> {
        let body = CreateVideoRequest::from_job(job);

        let response = self
            .client
            .post(format!("{}/api/create-video", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`RenderApiError::ApiError`] with status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RenderApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RenderApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RenderApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RenderService for RenderApi {
    async fn render(&self, job: &JobSpec) -> Result<RenderOutcome, RenderApiError> {
        tracing::debug!(hook = %job.hook_text, "Submitting render job");
        self.create_video(job).await
    }
}
