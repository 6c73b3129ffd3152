//! Hookreel domain core.
//!
//! Pure types and logic shared by every other crate: media references,
//! hook parsing, job specs, the persisted batch snapshot, and the
//! progress / estimation arithmetic. No I/O lives here.

pub mod batch_state;
pub mod error;
pub mod estimation;
pub mod hooks;
pub mod job;
pub mod media;
pub mod progress;
pub mod selections;
pub mod types;
