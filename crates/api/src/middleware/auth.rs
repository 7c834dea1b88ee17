//! Authentication extractors for Axum handlers.
//!
//! Two schemes share the `Authorization` header: `Bearer <jwt>` for account
//! sessions and `ApiKey <raw key>` for programmatic access.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use gatekey_core::api_keys::{extract_credential, ApiKey};

use crate::error::AppError;
use crate::middleware::client::ClientContext;
use crate::state::AppState;

/// Account authenticated by a JWT Bearer token.
///
/// ```ignore
/// async fn my_handler(account: AuthAccount) -> AppResult<Json<()>> {
///     tracing::info!(username = %account.username, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthAccount {
    /// The token subject.
    pub username: String,
    pub roles: Vec<String>,
}

impl FromRequestParts<AppState> for AuthAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = authorization(parts)?.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Invalid Authorization format. Expected: Bearer <token>".into())
        })?;

        let principal = state.sessions.authenticate_bearer(token)?;

        Ok(AuthAccount {
            username: principal.username,
            roles: principal.roles,
        })
    }
}

/// Enabled API key whose access policies admit the caller's address.
///
/// Unknown keys are rejected with 401. Disabled keys and disallowed
/// addresses are rejected with 403. The address is the socket peer;
/// `X-Forwarded-For` only counts when the peer is a configured trusted proxy.
#[derive(Debug, Clone)]
pub struct AuthApiKey(pub ApiKey);

impl FromRequestParts<AppState> for AuthApiKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw_key = extract_credential(authorization(parts)?).ok_or_else(|| {
            AppError::Unauthorized("Invalid Authorization format. Expected: ApiKey <key>".into())
        })?;

        let key = state
            .api_keys
            .authenticate(raw_key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid API key".into()))?;

        if !key.enabled {
            tracing::debug!(api_key_id = key.id, "Disabled API key rejected");
            return Err(AppError::Forbidden("API key is disabled".into()));
        }

        let ClientContext(context) = ClientContext::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        let client = context.trusted_client_addr(&state.config.trusted_proxies);
        let permitted =
            key.access_policies.is_empty() || client.is_some_and(|ip| key.permits(ip));

        if !permitted {
            tracing::warn!(
                api_key_id = key.id,
                client = ?client,
                "API key used from outside its access policies",
            );
            return Err(AppError::Forbidden(
                "Request origin is not permitted for this API key".into(),
            ));
        }

        Ok(AuthApiKey(key))
    }
}

fn authorization(parts: &Parts) -> Result<&str, AppError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))
}
