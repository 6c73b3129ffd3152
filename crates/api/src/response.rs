//! Shared response envelope types for API handlers.
//!
//! Batch and upload responses use a `{ "data": ... }` envelope. The
//! progress endpoints keep their bare `{ "success": true }` /
//! `{ "progress": N }` shapes for existing clients.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
