//! The persisted snapshot of an in-flight batch (checkpoint record).
//!
//! [`BatchState`] is the only thing consulted when a batch is resumed
//! after a restart; nothing else held in memory is trusted. It is
//! rewritten after every job and periodically while a render is in
//! flight, and removed once the batch finishes or is abandoned.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::progress::SETUP_PERCENT;
use crate::types::Percent;

/// Position of the dispatch loop within the hook x media pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCursor {
    pub hook_index: u32,
    pub media_index: u32,
}

impl JobCursor {
    pub const START: JobCursor = JobCursor {
        hook_index: 0,
        media_index: 0,
    };

    /// The cursor a fresh run holds while job `job_index` is in flight.
    pub fn for_job(job_index: u32, media_count: u32) -> Self {
        Self {
            hook_index: job_index,
            media_index: if media_count == 0 {
                0
            } else {
                job_index % media_count
            },
        }
    }
}

/// Durable snapshot of a batch. Field names match the persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchState {
    pub is_generating: bool,
    pub total_to_generate: u32,
    /// Successful jobs so far. Never exceeds `total_to_generate`.
    pub generated_count: u32,
    pub current_hook_index: u32,
    pub current_media_index: u32,
    /// Result locators, in job order.
    #[serde(default)]
    pub generated_videos: Vec<String>,
    #[serde(alias = "progress")]
    pub progress_percent: Percent,
}

impl BatchState {
    /// The snapshot written when a fresh batch is dispatched.
    pub fn start(total_to_generate: u32) -> Self {
        Self {
            is_generating: true,
            total_to_generate,
            generated_count: 0,
            current_hook_index: 0,
            current_media_index: 0,
            generated_videos: Vec::new(),
            progress_percent: SETUP_PERCENT,
        }
    }

    pub fn cursor(&self) -> JobCursor {
        JobCursor {
            hook_index: self.current_hook_index,
            media_index: self.current_media_index,
        }
    }

    pub fn set_cursor(&mut self, cursor: JobCursor) {
        self.current_hook_index = cursor.hook_index;
        self.current_media_index = cursor.media_index;
    }

    /// Record a successful job result.
    pub fn record_video(&mut self, locator: impl Into<String>) {
        self.generated_videos.push(locator.into());
        self.generated_count = (self.generated_count + 1).min(self.total_to_generate);
    }

    /// An interrupted batch that still has work left.
    pub fn is_resumable(&self) -> bool {
        self.is_generating
            && self.generated_count < self.total_to_generate
            && self.current_hook_index < self.total_to_generate
    }

    /// Structural invariants of a snapshot read back from storage.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.total_to_generate == 0 {
            return Err(CoreError::Validation("totalToGenerate must be positive".into()));
        }
        if self.generated_count > self.total_to_generate {
            return Err(CoreError::Validation(format!(
                "generatedCount {} exceeds totalToGenerate {}",
                self.generated_count, self.total_to_generate
            )));
        }
        if self.generated_videos.len() as u32 != self.generated_count {
            return Err(CoreError::Validation(format!(
                "generatedVideos has {} entries but generatedCount is {}",
                self.generated_videos.len(),
                self.generated_count
            )));
        }
        if self.current_hook_index > self.total_to_generate {
            return Err(CoreError::Validation(format!(
                "currentHookIndex {} is past totalToGenerate {}",
                self.current_hook_index, self.total_to_generate
            )));
        }
        if self.progress_percent > 100 {
            return Err(CoreError::Validation(format!(
                "progress {} is out of range",
                self.progress_percent
            )));
        }
        Ok(())
    }
}
