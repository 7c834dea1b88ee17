//! Handlers for requests authenticated with an API key.

use axum::Json;
use gatekey_core::api_keys::ApiKey;

use crate::middleware::auth::AuthApiKey;
use crate::response::DataResponse;

/// GET /api/v1/keys/current
///
/// Echo the key the request authenticated with. The hash is never serialized.
pub async fn current_key(AuthApiKey(key): AuthApiKey) -> Json<DataResponse<ApiKey>> {
    tracing::debug!(api_key_id = key.id, "Echoing current API key");
    Json(DataResponse { data: key })
}
