// ================================================================
// File: tablepoints-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Uuid error: {0}")]
    Uuid(#[from] uuid::Error),

    // Points domain:
    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    #[error("Duplicate redemption for idempotency key '{0}'")]
    DuplicateRedemption(String),

    #[error("Reward unavailable: {0}")]
    RewardUnavailable(String),

    #[error("Invalid points amount: {0}")]
    InvalidAmount(i64),

    #[error("Invalid rule configuration: {0}")]
    InvalidRule(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// True for conditions caused by the caller's request rather than by
    /// infrastructure. These are reported back and never retried.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InsufficientPoints { .. }
                | Error::DuplicateRedemption(_)
                | Error::RewardUnavailable(_)
                | Error::InvalidAmount(_)
                | Error::InvalidState(_)
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
