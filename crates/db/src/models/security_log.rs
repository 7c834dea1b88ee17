//! Security log row.

use gatekey_core::audit::SecurityLog;
use gatekey_core::fingerprint::RequestMetadata;
use gatekey_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `security_logs` table.
#[derive(Debug, Clone, FromRow)]
pub struct SecurityLogRow {
    pub id: DbId,
    pub account_id: DbId,
    pub action: String,
    pub request_metadata: Option<Json<RequestMetadata>>,
    pub created_at: Timestamp,
}

impl From<SecurityLogRow> for SecurityLog {
    fn from(row: SecurityLogRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            action: row.action,
            request_metadata: row.request_metadata.map(|Json(metadata)| metadata),
            created_at: row.created_at,
        }
    }
}
