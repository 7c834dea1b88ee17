//! Repository for the `refresh_tokens` table.

use gatekey_core::account::RefreshToken;
use gatekey_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::refresh_token::RefreshTokenRow;

const COLUMNS: &str = "token, account_id, created_at, expires_at, request_metadata";

/// Provides CRUD operations for refresh tokens (signed-in devices).
pub struct RefreshTokenRepo;

impl RefreshTokenRepo {
    pub async fn create(
        pool: &PgPool,
        input: &RefreshToken,
    ) -> Result<RefreshTokenRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO refresh_tokens (token, account_id, created_at, expires_at, request_metadata)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RefreshTokenRow>(&query)
            .bind(input.token)
            .bind(input.account_id)
            .bind(input.created_at)
            .bind(input.expires_at)
            .bind(input.request_metadata.as_ref().map(Json))
            .fetch_one(pool)
            .await
    }

    /// Find a token regardless of expiry; callers decide what "active" means.
    pub async fn find_by_token(
        pool: &PgPool,
        token: Uuid,
    ) -> Result<Option<RefreshTokenRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE token = $1");
        sqlx::query_as::<_, RefreshTokenRow>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_account(
        pool: &PgPool,
        account_id: DbId,
    ) -> Result<Vec<RefreshTokenRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM refresh_tokens WHERE account_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, RefreshTokenRow>(&query)
            .bind(account_id)
            .fetch_all(pool)
            .await
    }

    /// Delete one of the account's tokens. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, account_id: DbId, token: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE account_id = $1 AND token = $2")
            .bind(account_id)
            .bind(token)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every token of the account. Returns the count of deleted rows.
    pub async fn delete_all_for_account(pool: &PgPool, account_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE account_id = $1")
            .bind(account_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
