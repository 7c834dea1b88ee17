//! Account row.

use gatekey_core::account::Account;
use gatekey_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `accounts` table.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: DbId,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub email_subscription_enabled: bool,
    pub billing_alert_enabled: bool,
    pub roles: Vec<String>,
    pub password_reset_token: Option<Uuid>,
    pub password_reset_token_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            full_name: row.full_name,
            email_subscription_enabled: row.email_subscription_enabled,
            billing_alert_enabled: row.billing_alert_enabled,
            roles: row.roles,
            password_reset_token: row.password_reset_token,
            password_reset_token_expires_at: row.password_reset_token_expires_at,
            created_at: row.created_at,
        }
    }
}
