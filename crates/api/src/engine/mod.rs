//! Batch execution engine: owns the single in-flight batch.

pub mod batches;

pub use batches::{BatchManager, BatchStatus};
