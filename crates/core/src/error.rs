use crate::types::DbId;

/// Failure reported by a storage backend.
///
/// Backends wrap their native error (e.g. `sqlx::Error`) so the services can
/// stay storage-agnostic.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Unknown username and wrong password are deliberately the same variant.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username is unavailable")]
    UsernameUnavailable,

    #[error("Password reset token not found")]
    TokenNotFound,

    #[error("Password reset token has expired")]
    TokenExpired,

    #[error("Invalid or expired access token")]
    InvalidToken,

    /// Missing, owned by another account, or soft-deleted.
    #[error("API key not found: {id}")]
    KeyNotFound { id: DbId },

    #[error("API key limit of {limit} reached")]
    QuotaExceeded { limit: i64 },

    #[error("Entity not found: {entity} {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias used by every service operation.
pub type CoreResult<T> = Result<T, CoreError>;
