//! Repository for the `api_keys` and `api_key_logs` tables.
//!
//! Every write that changes a key also appends to its log, and to the
//! account's security log where the change calls for it, inside the same
//! transaction.

use gatekey_core::api_keys::{ApiKey, NewApiKey};
use gatekey_core::audit::{ApiKeyEvent, NewSecurityLog, SecurityEvent};
use gatekey_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::api_key::{ApiKeyLogRow, ApiKeyRow};
use crate::repositories::SecurityLogRepo;

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const API_KEY_COLUMNS: &str = "\
    id, account_id, name, prefix, hash, enabled, scope, access_policies, \
    created_at, modified_at, deleted_at";

const LOG_COLUMNS: &str = "id, api_key_id, action, created_at";

/// Provides CRUD operations for API keys and their change log.
pub struct ApiKeyRepo;

impl ApiKeyRepo {
    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Count the account's non-deleted keys.
    pub async fn count_active(pool: &PgPool, account_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM api_keys WHERE account_id = $1 AND deleted_at IS NULL",
        )
        .bind(account_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn list_active_by_account(
        pool: &PgPool,
        account_id: DbId,
    ) -> Result<Vec<ApiKeyRow>, sqlx::Error> {
        let query = format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE account_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, ApiKeyRow>(&query)
            .bind(account_id)
            .fetch_all(pool)
            .await
    }

    /// Find a key owned by `account_id` that has not been deleted.
    pub async fn find_active(
        pool: &PgPool,
        account_id: DbId,
        id: DbId,
    ) -> Result<Option<ApiKeyRow>, sqlx::Error> {
        let query = format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE id = $1 AND account_id = $2 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, ApiKeyRow>(&query)
            .bind(id)
            .bind(account_id)
            .fetch_optional(pool)
            .await
    }

    /// Authentication candidates: non-deleted keys sharing `prefix`.
    pub async fn list_active_by_prefix(
        pool: &PgPool,
        prefix: &str,
    ) -> Result<Vec<ApiKeyRow>, sqlx::Error> {
        let query = format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE prefix = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, ApiKeyRow>(&query)
            .bind(prefix)
            .fetch_all(pool)
            .await
    }

    /// One page of a key's log, newest first.
    pub async fn list_logs(
        pool: &PgPool,
        api_key_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ApiKeyLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {LOG_COLUMNS} FROM api_key_logs \
             WHERE api_key_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ApiKeyLogRow>(&query)
            .bind(api_key_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a key, its `created` log entry and the account's `create_key`
    /// security log unless the account already holds `limit` non-deleted
    /// keys.
    ///
    /// The account row is locked `FOR UPDATE` first, so concurrent creates for
    /// one account serialize on the count. Returns `None` when over quota.
    pub async fn create_within_quota(
        pool: &PgPool,
        input: &NewApiKey,
        limit: i64,
    ) -> Result<Option<ApiKeyRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(input.account_id)
            .execute(&mut *tx)
            .await?;

        let (active,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM api_keys WHERE account_id = $1 AND deleted_at IS NULL",
        )
        .bind(input.account_id)
        .fetch_one(&mut *tx)
        .await?;

        if active >= limit {
            tx.rollback().await?;
            return Ok(None);
        }

        let query = format!(
            "INSERT INTO api_keys \
                (account_id, name, prefix, hash, enabled, scope, access_policies, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {API_KEY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ApiKeyRow>(&query)
            .bind(input.account_id)
            .bind(&input.name)
            .bind(&input.prefix)
            .bind(&input.hash)
            .bind(input.enabled)
            .bind(Json(&input.scope))
            .bind(Json(&input.access_policies))
            .bind(input.created_at)
            .fetch_one(&mut *tx)
            .await?;

        Self::insert_logs(&mut tx, row.id, &[ApiKeyEvent::Created]).await?;
        SecurityLogRepo::create(
            &mut *tx,
            &NewSecurityLog::new(row.account_id, &SecurityEvent::CreateKey { key_id: row.id }),
        )
        .await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    /// Lock the account's non-deleted key `FOR UPDATE`, let `edit` change it,
    /// then write the mutable columns, one log entry per returned event and
    /// `security` in the same transaction.
    ///
    /// Concurrent calls for one key queue on the row lock, so each edit sees
    /// the previous one's result. When `edit` reports no events the
    /// transaction is rolled back and the locked row is returned unchanged.
    /// `None` means no such key exists. Setting `deleted_at` here is how keys
    /// are soft-deleted.
    pub async fn modify_active<F>(
        pool: &PgPool,
        account_id: DbId,
        id: DbId,
        edit: F,
        security: Option<&SecurityEvent>,
    ) -> Result<Option<(ApiKeyRow, Vec<ApiKeyEvent>)>, sqlx::Error>
    where
        F: FnOnce(&mut ApiKey) -> Vec<ApiKeyEvent>,
    {
        let mut tx = pool.begin().await?;

        let query = format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE id = $1 AND account_id = $2 AND deleted_at IS NULL \
             FOR UPDATE"
        );
        let locked = sqlx::query_as::<_, ApiKeyRow>(&query)
            .bind(id)
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(locked) = locked else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut key = ApiKey::from(locked.clone());
        let events = edit(&mut key);
        if events.is_empty() {
            tx.rollback().await?;
            return Ok(Some((locked, events)));
        }

        let query = format!(
            "UPDATE api_keys SET \
                 name = $2, \
                 enabled = $3, \
                 scope = $4, \
                 access_policies = $5, \
                 modified_at = $6, \
                 deleted_at = $7 \
             WHERE id = $1 \
             RETURNING {API_KEY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ApiKeyRow>(&query)
            .bind(id)
            .bind(&key.name)
            .bind(key.enabled)
            .bind(Json(&key.scope))
            .bind(Json(&key.access_policies))
            .bind(key.modified_at)
            .bind(key.deleted_at)
            .fetch_one(&mut *tx)
            .await?;

        Self::insert_logs(&mut tx, id, &events).await?;
        if let Some(event) = security {
            SecurityLogRepo::create(&mut *tx, &NewSecurityLog::new(account_id, event)).await?;
        }
        tx.commit().await?;
        Ok(Some((row, events)))
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    async fn insert_logs(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        api_key_id: DbId,
        events: &[ApiKeyEvent],
    ) -> Result<(), sqlx::Error> {
        for event in events {
            sqlx::query("INSERT INTO api_key_logs (api_key_id, action) VALUES ($1, $2)")
                .bind(api_key_id)
                .bind(event.to_string())
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}
