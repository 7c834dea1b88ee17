//! Handlers for the `/me` resource.

use axum::extract::State;
use axum::Json;
use gatekey_core::account::Account;
use gatekey_core::fingerprint::RequestMetadata;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthAccount;
use crate::middleware::client::ClientFingerprint;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CurrentAccount {
    pub account: Account,
    /// Fingerprint of this request, as sign-in origin checks would see it.
    pub request_metadata: Option<RequestMetadata>,
}

/// GET /api/v1/me
pub async fn current_account(
    State(state): State<AppState>,
    auth: AuthAccount,
    ClientFingerprint(request_metadata): ClientFingerprint,
) -> AppResult<Json<DataResponse<CurrentAccount>>> {
    let account = state.sessions.find_account(&auth.username).await?;

    Ok(Json(DataResponse {
        data: CurrentAccount {
            account,
            request_metadata,
        },
    }))
}
