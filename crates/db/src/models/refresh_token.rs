//! Refresh token (device) row.

use gatekey_core::account::RefreshToken;
use gatekey_core::fingerprint::RequestMetadata;
use gatekey_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `refresh_tokens` table.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub token: Uuid,
    pub account_id: DbId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub request_metadata: Option<Json<RequestMetadata>>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            token: row.token,
            account_id: row.account_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            request_metadata: row.request_metadata.map(|Json(metadata)| metadata),
        }
    }
}
