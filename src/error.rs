use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

/// The crate-wide error type. Each variant is one taxonomy kind from the
/// ledger's error handling design; the HTTP layer maps variants to status
/// codes via `IntoResponse` below.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("account not found: {0}")]
    InvalidAccount(String),

    #[error("account suspended: {0}")]
    AccountSuspended(String),

    #[error("currency mismatch: {0}")]
    CurrencyMismatch(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("duplicate transaction: {original_transaction_id}")]
    DuplicateTransaction { original_transaction_id: Uuid },

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Returns the stable taxonomy tag used in logs, metrics, and the
    /// `error` field of the JSON error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidAmount(_) => "InvalidAmount",
            AppError::InvalidAccount(_) => "InvalidAccount",
            AppError::AccountSuspended(_) => "AccountSuspended",
            AppError::CurrencyMismatch(_) => "CurrencyMismatch",
            AppError::InsufficientFunds(_) => "InsufficientFunds",
            AppError::DuplicateTransaction { .. } => "DuplicateTransaction",
            AppError::ConcurrentModification(_) => "ConcurrentModification",
            AppError::RateLimitExceeded => "RateLimitExceeded",
            AppError::Validation(_) => "Validation",
            AppError::NotFound(_) => "NotFound",
            AppError::Database(_) => "Internal",
            AppError::Redis(_) => "Internal",
            AppError::Internal(_) => "Internal",
        }
    }

    /// True for the kinds the Payment Engine's bounded retry loop should
    /// re-attempt rather than surface on the first failure.
    pub fn is_retryable_conflict(&self) -> bool {
        match self {
            AppError::ConcurrentModification(_) => true,
            AppError::Database(sqlx::Error::Database(db_err)) => {
                // Postgres serialization_failure (40001) and
                // unique_violation (23505) on a racing idempotency insert.
                matches!(db_err.code().as_deref(), Some("40001") | Some("23505"))
            }
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidAccount(_) => StatusCode::NOT_FOUND,
            AppError::AccountSuspended(_) => StatusCode::FORBIDDEN,
            AppError::CurrencyMismatch(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientFunds(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateTransaction { .. } => StatusCode::CONFLICT,
            AppError::ConcurrentModification(_) => StatusCode::CONFLICT,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            AppError::DuplicateTransaction {
                original_transaction_id,
            } => json!({
                "error": self.kind(),
                "message": self.to_string(),
                "original_transaction_id": original_transaction_id,
            }),
            _ => json!({
                "error": self.kind(),
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
