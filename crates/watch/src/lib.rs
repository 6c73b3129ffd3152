//! Resilient subscriber for the progress stream.
//!
//! [`ProgressClient`] keeps a live view of the server's progress value,
//! reconnecting with exponential backoff and jitter when the stream drops
//! and giving up after a bounded number of consecutive failures.

pub mod backoff;
pub mod client;
pub mod config;
pub mod machine;
pub mod sse;

pub use backoff::RetryPolicy;
pub use client::{ProgressClient, ProgressClientError, ProgressSource, ProgressStream, SseProgressSource};
pub use config::WatchConfig;
pub use machine::{Action, ConnectionEvent, ConnectionState, ReconnectMachine};
