//! API key and API key log rows.
//!
//! `scope` and `access_policies` are JSONB columns decoded straight into the
//! core types.

use gatekey_core::api_keys::{AccessPolicy, ApiKey, Scope};
use gatekey_core::audit::ApiKeyLog;
use gatekey_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// API Key
// ---------------------------------------------------------------------------

/// A row from the `api_keys` table.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyRow {
    pub id: DbId,
    pub account_id: DbId,
    pub name: String,
    pub prefix: String,
    pub hash: String,
    pub enabled: bool,
    pub scope: Json<Scope>,
    pub access_policies: Json<Vec<AccessPolicy>>,
    pub created_at: Timestamp,
    pub modified_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            name: row.name,
            prefix: row.prefix,
            hash: row.hash,
            enabled: row.enabled,
            scope: row.scope.0,
            access_policies: row.access_policies.0,
            created_at: row.created_at,
            modified_at: row.modified_at,
            deleted_at: row.deleted_at,
        }
    }
}

// ---------------------------------------------------------------------------
// API Key Log
// ---------------------------------------------------------------------------

/// A row from the `api_key_logs` table.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyLogRow {
    pub id: DbId,
    pub api_key_id: DbId,
    pub action: String,
    pub created_at: Timestamp,
}

impl From<ApiKeyLogRow> for ApiKeyLog {
    fn from(row: ApiKeyLogRow) -> Self {
        Self {
            id: row.id,
            api_key_id: row.api_key_id,
            action: row.action,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_json_columns() {
        let now = chrono::Utc::now();
        let row = ApiKeyRow {
            id: 4,
            account_id: 2,
            name: "prod".into(),
            prefix: "AbC1234".into(),
            hash: "$argon2id$...".into(),
            enabled: true,
            scope: Json(Scope {
                gif: true,
                ..Scope::default()
            }),
            access_policies: Json(vec![AccessPolicy::new("office", "10.0.0.0/8")]),
            created_at: now,
            modified_at: None,
            deleted_at: None,
        };

        let key = ApiKey::from(row);
        assert!(key.scope.gif);
        assert_eq!(key.access_policies[0].range, "10.0.0.0/8");
        assert!(!key.is_deleted());
    }

    #[test]
    fn stored_scope_json_tolerates_missing_flags() {
        let scope: Scope = serde_json::from_str(r#"{"image": true, "text": {}}"#).unwrap();
        assert!(scope.image);
        assert!(!scope.text.toxicity);
        assert!(!scope.video);
    }
}
