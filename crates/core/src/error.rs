/// Domain-level error shared by every crate in the workspace.
///
/// HTTP-facing crates map these variants onto status codes; library
/// crates wrap them in their own error enums where more context helps.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A required selection is missing before a batch may start.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
