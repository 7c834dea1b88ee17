//! Billing log row.

use gatekey_core::audit::BillingLog;
use gatekey_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `billing_logs` table.
#[derive(Debug, Clone, FromRow)]
pub struct BillingLogRow {
    pub id: DbId,
    pub account_id: DbId,
    pub action: String,
    pub amount: String,
    pub created_at: Timestamp,
}

impl From<BillingLogRow> for BillingLog {
    fn from(row: BillingLogRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            action: row.action,
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}
