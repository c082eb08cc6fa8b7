use thiserror::Error;

/// Result type for platform collaborator calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors surfaced by secondary-platform collaborators.
///
/// Callers treat any error as a reported failure (fail closed); a timeout
/// is indistinguishable from an unreachable collaborator.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected platform response: {0}")]
    Protocol(String),

    #[error("platform endpoint not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        PlatformError::Unreachable(err.to_string())
    }
}
