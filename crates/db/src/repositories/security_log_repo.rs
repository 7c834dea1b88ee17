//! Repository for the append-only `security_logs` table.

use gatekey_core::audit::NewSecurityLog;
use gatekey_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use crate::models::security_log::SecurityLogRow;

const COLUMNS: &str = "id, account_id, action, request_metadata, created_at";

pub struct SecurityLogRepo;

impl SecurityLogRepo {
    /// Accepts a pool or an open transaction, so other repositories can
    /// record an event atomically with their own write.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        input: &NewSecurityLog,
    ) -> Result<SecurityLogRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO security_logs (account_id, action, request_metadata, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SecurityLogRow>(&query)
            .bind(input.account_id)
            .bind(&input.action)
            .bind(input.request_metadata.as_ref().map(Json))
            .bind(input.created_at)
            .fetch_one(executor)
            .await
    }

    /// Full history in insertion order. Used for origin verification.
    pub async fn list_all_by_account(
        pool: &PgPool,
        account_id: DbId,
    ) -> Result<Vec<SecurityLogRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM security_logs WHERE account_id = $1 ORDER BY id");
        sqlx::query_as::<_, SecurityLogRow>(&query)
            .bind(account_id)
            .fetch_all(pool)
            .await
    }

    /// One page, newest first.
    pub async fn list_by_account(
        pool: &PgPool,
        account_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SecurityLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM security_logs
             WHERE account_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, SecurityLogRow>(&query)
            .bind(account_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
