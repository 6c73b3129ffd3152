//! Clients for the external collaborators a batch talks to: the Render
//! Service that turns a [`JobSpec`](hookreel_core::job::JobSpec) into a
//! video, and durable object storage used to dereference stored media.

pub mod api;
pub mod service;
pub mod storage;

pub use api::{RenderApi, RenderApiError};
pub use service::{RenderOutcome, RenderService};
pub use storage::{HttpObjectStore, ObjectStore, StorageError, StoredObject};
