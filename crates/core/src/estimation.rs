//! Render-time estimation used to animate progress while a job renders.
//!
//! The estimate is a coarse heuristic. It only drives the displayed
//! interpolation and has no effect on what gets rendered.

use std::time::Duration;

use crate::job::JobSpec;
use crate::media::MediaKind;

// ---------------------------------------------------------------------------
// Base budgets
// ---------------------------------------------------------------------------

/// Template and media are both still images.
pub const BASE_IMAGE_IMAGE_MS: u64 = 15_000;
/// One side is an image, the other a video.
pub const BASE_MIXED_MS: u64 = 30_000;
/// Template and media are both videos.
pub const BASE_VIDEO_VIDEO_MS: u64 = 45_000;

/// Total configured duration the base budgets are calibrated against.
pub const REFERENCE_DURATION_SECS: f64 = 10.0;

/// Lower bound so the elapsed ratio is always well defined.
pub const MIN_ESTIMATE_MS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Estimation logic
// ---------------------------------------------------------------------------

/// Base budget bucketed by the kinds of the two visual parts.
pub fn base_budget_ms(template: MediaKind, media: MediaKind) -> u64 {
    match (template, media) {
        (MediaKind::Image, MediaKind::Image) => BASE_IMAGE_IMAGE_MS,
        (MediaKind::Video, MediaKind::Video) => BASE_VIDEO_VIDEO_MS,
        _ => BASE_MIXED_MS,
    }
}

/// Estimate how long a render takes, scaled linearly by the configured
/// total duration relative to [`REFERENCE_DURATION_SECS`].
pub fn estimate_render_time(
    template: MediaKind,
    media: MediaKind,
    configured_duration_secs: f64,
) -> Duration {
    let factor = if configured_duration_secs.is_finite() && configured_duration_secs > 0.0 {
        configured_duration_secs / REFERENCE_DURATION_SECS
    } else {
        0.0
    };
    let millis = (base_budget_ms(template, media) as f64 * factor).round() as u64;
    Duration::from_millis(millis.max(MIN_ESTIMATE_MS))
}

/// Estimate for a concrete job spec.
pub fn estimate_job(job: &JobSpec) -> Duration {
    estimate_render_time(
        job.template.payload.kind,
        job.media.payload.kind,
        job.configured_duration_secs(),
    )
}

/// Fraction of the estimate already elapsed (may exceed 1.0).
pub fn elapsed_ratio(elapsed: Duration, estimate: Duration) -> f64 {
    if estimate.is_zero() {
        return 1.0;
    }
    elapsed.as_secs_f64() / estimate.as_secs_f64()
}
