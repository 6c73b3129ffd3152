//! The raw user selections a batch is built from.
//!
//! Everything a user picks in the batch form arrives here unvalidated;
//! missing picks are `None` / empty so the builder can report them as
//! precondition failures instead of deserialization errors.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::job::{DurationRange, StyleConfig, TemplatePosition};
use crate::media::MediaReference;

/// The selected background song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSelection {
    pub id: String,
    pub payload: MediaReference,
}

/// Everything needed to build (or rebuild, on resume) a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BatchSelections {
    #[serde(default)]
    pub template: Option<MediaReference>,
    #[serde(default)]
    pub template_position: TemplatePosition,
    #[serde(default)]
    #[validate(nested)]
    pub template_duration: DurationRange,
    /// Ordered media pool, consumed cyclically.
    #[serde(default)]
    pub media: Vec<MediaReference>,
    #[serde(default)]
    #[validate(nested)]
    pub media_duration: DurationRange,
    #[serde(default)]
    pub song: Option<SongSelection>,
    /// Raw multi-line hook text.
    #[serde(default)]
    pub hooks: String,
    #[serde(default)]
    #[validate(nested)]
    pub style: StyleConfig,
}
