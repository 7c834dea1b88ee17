use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gatekey_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers and extractors.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `gatekey_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Missing or malformed credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid credentials that may not be used for this request.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => classify_core_error(core),

            // --- HTTP-specific errors ---
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a domain error to an HTTP status, error code, and client-safe message.
///
/// Credential failures share one generic message. Storage and internal
/// details are logged and never returned.
fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "Invalid username or password".to_string(),
        ),
        CoreError::InvalidToken => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Invalid or expired token".to_string(),
        ),
        CoreError::UsernameUnavailable => (
            StatusCode::CONFLICT,
            "USERNAME_UNAVAILABLE",
            err.to_string(),
        ),
        CoreError::TokenNotFound => (StatusCode::BAD_REQUEST, "TOKEN_NOT_FOUND", err.to_string()),
        CoreError::TokenExpired => (StatusCode::BAD_REQUEST, "TOKEN_EXPIRED", err.to_string()),
        CoreError::KeyNotFound { id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("API key with id {id} not found"),
        ),
        CoreError::NotFound { entity, .. } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} not found"),
        ),
        CoreError::QuotaExceeded { .. } => {
            (StatusCode::FORBIDDEN, "QUOTA_EXCEEDED", err.to_string())
        }
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Store(e) => {
            tracing::error!(error = %e, "Storage error");
            internal()
        }
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekey_core::error::StoreError;

    fn status_of(err: CoreError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn core_errors_map_to_statuses() {
        assert_eq!(status_of(CoreError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(CoreError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(CoreError::UsernameUnavailable), StatusCode::CONFLICT);
        assert_eq!(status_of(CoreError::TokenNotFound), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(CoreError::TokenExpired), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(CoreError::KeyNotFound { id: 3 }), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(CoreError::QuotaExceeded { limit: 10 }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(CoreError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn storage_errors_are_opaque() {
        let response =
            AppError::from(CoreError::Store(StoreError::new("connection reset"))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
