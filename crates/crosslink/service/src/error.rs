use thiserror::Error;

/// Result type for orchestrator operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Typed outcomes of the linking operations.
///
/// Every recoverable failure maps to exactly one variant so the calling
/// layer can render a distinguishable message; only genuine infrastructure
/// faults surface as `Internal`.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid account name: {0}")]
    InvalidName(String),

    #[error("malformed verification code")]
    InvalidCode,

    #[error("too many requests, try again later")]
    RateLimited,

    #[error("already linked to {target_name}")]
    AlreadyLinked { target_name: String },

    #[error("account {0} does not exist on the second platform")]
    TargetNotFound(String),

    #[error("account {0} is already linked to another requester")]
    TargetAlreadyLinked(String),

    #[error("account {0} is not currently present on the server")]
    TargetNotReachable(String),

    #[error("could not deliver the verification code to {0}")]
    DeliveryFailed(String),

    #[error("verification code is invalid or has expired")]
    InvalidOrExpired,

    #[error("verification code belongs to a different requester")]
    OwnerMismatch,

    #[error("no link to remove")]
    NothingToUnlink,

    #[error("caller is not authorized")]
    NotAuthorized,

    #[error("internal error: {0}")]
    Internal(String),
}
