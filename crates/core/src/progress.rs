//! Overall batch progress: constants, the broadcast payload, and the
//! band arithmetic used by the dispatch loop.
//!
//! The first and last 5% are reserved for setup and teardown. Jobs share
//! the 90% in between evenly; job `i` of `n` owns the band
//! `[5 + i/n*90, 5 + (i+1)/n*90]`, and nothing but the final completion
//! step may push the overall value past 95.

use serde::{Deserialize, Serialize};

use crate::types::Percent;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Progress reported once setup (validation, resolution) is done.
pub const SETUP_PERCENT: Percent = 5;

/// Share of the overall bar covered by the jobs themselves.
pub const JOB_SPAN_PERCENT: f64 = 90.0;

/// Highest value reachable before the batch completes.
pub const JOB_CEILING_PERCENT: Percent = 95;

/// Value broadcast once every job has been processed.
pub const COMPLETE_PERCENT: Percent = 100;

/// Interpolation never claims more than this fraction of a job's band.
pub const MAX_INTERPOLATION_RATIO: f64 = 0.95;

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// The only payload broadcast on the progress channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub progress: Percent,
}

impl ProgressEvent {
    pub fn new(progress: Percent) -> Self {
        Self { progress }
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Clamp an arbitrary integer into `[0, 100]`.
pub fn clamp_percent(value: i64) -> Percent {
    value.clamp(0, 100) as Percent
}

/// Clamp and round a floating-point value into `[0, 100]`.
pub fn clamp_percent_f64(value: f64) -> Percent {
    if value.is_nan() {
        return 0;
    }
    clamp_percent(value.round() as i64)
}

fn band_start(job_index: u32, total: u32) -> f64 {
    f64::from(SETUP_PERCENT) + f64::from(job_index) / f64::from(total.max(1)) * JOB_SPAN_PERCENT
}

/// Floor shown while job `job_index` starts: `round(5 + i/n*90)`.
pub fn job_floor(job_index: u32, total: u32) -> Percent {
    clamp_percent_f64(band_start(job_index, total))
}

/// Value set when job `job_index` finishes: `min(round(5 + (i+1)/n*90), 95)`.
pub fn job_completion(job_index: u32, total: u32) -> Percent {
    job_floor(job_index + 1, total).min(JOB_CEILING_PERCENT)
}

/// Interpolated value while job `job_index` is rendering.
///
/// `elapsed_ratio` is elapsed time over the estimated budget; it is
/// capped at [`MAX_INTERPOLATION_RATIO`] so the estimate never claims the
/// job is done, and the overall value never exceeds 95.
pub fn interpolated(job_index: u32, total: u32, elapsed_ratio: f64) -> Percent {
    let ratio = if elapsed_ratio.is_nan() {
        0.0
    } else {
        elapsed_ratio.clamp(0.0, MAX_INTERPOLATION_RATIO)
    };
    let per_job = JOB_SPAN_PERCENT / f64::from(total.max(1));
    clamp_percent_f64(band_start(job_index, total) + per_job * ratio).min(JOB_CEILING_PERCENT)
}
