//! Batch pipeline: turn user selections into rendered videos.
//!
//! - [`builder`] validates selections and resolves every payload inline.
//! - [`dispatch`] runs the jobs in order with live progress.
//! - [`state_store`] checkpoints the in-flight batch.
//! - [`resume`] picks an interrupted batch back up after a restart.

pub mod builder;
pub mod dispatch;
pub mod resolve;
pub mod resume;
pub mod state_store;
pub mod tracker;
pub mod uploads;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{build_batch, BatchPlan, BuildError};
pub use dispatch::{BatchReport, BatchRunner, DispatchConfig, JobFailure};
pub use resolve::{MediaResolver, ResolveError};
pub use resume::{ResumeController, ResumeError, ResumePhase};
pub use state_store::{Checkpointer, FileStateStore, MemoryStateStore, StateStore, StateStoreError};
pub use uploads::{UploadCache, UploadError, UploadLimits};
