//! Job specifications and the per-batch configuration they are built from.
//!
//! A [`JobSpec`] describes exactly one output video and is fully
//! self-contained: every media payload is inline, so a spec stays valid
//! after the session that created it is gone.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;
use crate::media::MediaReference;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Vertical placement of the hook overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookPosition {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// Vertical placement of the template within the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplatePosition {
    Top,
    #[default]
    Center,
    Bottom,
}

// ---------------------------------------------------------------------------
// StyleConfig
// ---------------------------------------------------------------------------

/// Hook overlay style. Chosen once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StyleConfig {
    /// Visual variant, `1` or `2`.
    #[validate(range(min = 1, max = 2))]
    pub variant: u8,
    pub position: HookPosition,
    #[serde(default)]
    #[validate(range(min = -50, max = 50))]
    pub vertical_offset_px: i32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            variant: 1,
            position: HookPosition::Top,
            vertical_offset_px: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// DurationRange
// ---------------------------------------------------------------------------

/// Minimum / maximum length in seconds the renderer may use for a part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_duration_range"))]
pub struct DurationRange {
    pub min: f64,
    pub max: f64,
}

impl DurationRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

impl Default for DurationRange {
    fn default() -> Self {
        Self { min: 3.0, max: 5.0 }
    }
}

fn validate_duration_range(range: &DurationRange) -> Result<(), ValidationError> {
    if !range.min.is_finite() || !range.max.is_finite() || range.min < 0.0 {
        return Err(ValidationError::new("duration_range_bounds"));
    }
    if range.max < range.min {
        return Err(ValidationError::new("duration_range_order"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JobSpec
// ---------------------------------------------------------------------------

/// The template part of a job (shown first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePart {
    pub payload: MediaReference,
    pub position: TemplatePosition,
    pub duration_range: DurationRange,
}

/// The rotating user-media part of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPart {
    pub payload: MediaReference,
    pub duration_range: DurationRange,
}

/// Background music for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongPart {
    pub id: String,
    pub payload: MediaReference,
}

/// A fully-resolved description of one video to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub hook_text: String,
    pub style: StyleConfig,
    pub template: TemplatePart,
    pub media: MediaPart,
    pub song: SongPart,
}

impl JobSpec {
    /// Assemble a spec, rejecting any payload that is not inline.
    pub fn new(
        hook_text: impl Into<String>,
        style: StyleConfig,
        template: TemplatePart,
        media: MediaPart,
        song: SongPart,
    ) -> Result<Self, CoreError> {
        let spec = Self {
            hook_text: hook_text.into(),
            style,
            template,
            media,
            song,
        };
        if !spec.is_resolved() {
            return Err(CoreError::Validation(
                "job spec payloads must be inline before submission".into(),
            ));
        }
        Ok(spec)
    }

    /// True when every payload carries inline data.
    pub fn is_resolved(&self) -> bool {
        self.template.payload.locator.is_inline()
            && self.media.payload.locator.is_inline()
            && self.song.payload.locator.is_inline()
    }

    /// Sum of the template and media range midpoints, in seconds.
    pub fn configured_duration_secs(&self) -> f64 {
        self.template.duration_range.midpoint() + self.media.duration_range.midpoint()
    }
}
