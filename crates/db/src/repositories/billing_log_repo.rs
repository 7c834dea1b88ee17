//! Repository for the append-only `billing_logs` table.

use gatekey_core::audit::NewBillingLog;
use gatekey_core::types::DbId;
use sqlx::PgPool;

use crate::models::billing_log::BillingLogRow;

const COLUMNS: &str = "id, account_id, action, amount, created_at";

pub struct BillingLogRepo;

impl BillingLogRepo {
    pub async fn create(pool: &PgPool, input: &NewBillingLog) -> Result<BillingLogRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO billing_logs (account_id, action, amount, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BillingLogRow>(&query)
            .bind(input.account_id)
            .bind(&input.action)
            .bind(&input.amount)
            .bind(input.created_at)
            .fetch_one(pool)
            .await
    }

    /// One page, newest first.
    pub async fn list_by_account(
        pool: &PgPool,
        account_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BillingLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM billing_logs
             WHERE account_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, BillingLogRow>(&query)
            .bind(account_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
