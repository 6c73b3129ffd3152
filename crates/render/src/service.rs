//! The render seam used by the dispatch loop.

use async_trait::async_trait;
use hookreel_core::job::JobSpec;
use hookreel_core::types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::api::RenderApiError;

/// A finished render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutcome {
    /// Where the produced video can be fetched.
    #[serde(alias = "videoPath")]
    pub video_locator: String,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

/// Submit-and-await render RPC. One call per job, no streaming.
#[async_trait]
pub trait RenderService: Send + Sync {
    async fn render(&self, job: &JobSpec) -> Result<RenderOutcome, RenderApiError>;
}
