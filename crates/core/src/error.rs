//! Domain error taxonomy.

use thiserror::Error;

/// Errors surfaced by the progress engine.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Unknown user, module, course or team
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller passed an out-of-range or inconsistent value
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A concurrent write lost a value. Should not occur while per-key
    /// serialization holds; retried once before surfacing.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The persistence layer is unreachable or failing
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl TrackError {
    /// Convenience constructor for missing-entity errors.
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        TrackError::NotFound(format!("{} {}", kind, id))
    }
}
