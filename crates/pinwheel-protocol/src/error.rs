//! Error taxonomy for the league ledger.

use thiserror::Error;

/// Errors raised by the ledger, its projections, and the domain services
/// layered on top of it.
#[derive(Debug, Error)]
pub enum LeagueError {
    /// A malformed event or a missing required field.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A domain argument that cannot be honored (bad carry-forward target,
    /// league mismatch, wrong counterparty).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },
    #[error("insufficient {token} balance for governor {governor}: have {available}, need {requested}")]
    InsufficientBalance {
        governor: String,
        token: String,
        available: u32,
        requested: u32,
    },
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LeagueError {
    /// Whether a boundary layer should surface this as a client error
    /// (4xx) rather than a server error (5xx).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Persistence(_) | Self::Serialization(_))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<serde_json::Error> for LeagueError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience result type for ledger operations.
pub type LeagueResult<T> = Result<T, LeagueError>;
