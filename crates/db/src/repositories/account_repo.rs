//! Repository for the `accounts` table.

use gatekey_core::account::{Account, NewAccount};
use gatekey_core::audit::{NewSecurityLog, SecurityEvent};
use gatekey_core::types::DbId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::account::AccountRow;
use crate::repositories::SecurityLogRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, password_hash, full_name, email_subscription_enabled, \
                       billing_alert_enabled, roles, password_reset_token, \
                       password_reset_token_expires_at, created_at";

/// Provides CRUD operations for accounts.
pub struct AccountRepo;

impl AccountRepo {
    /// Insert a new account and its `created` security log in one
    /// transaction. Returns `None` if the username is taken.
    pub async fn create(
        pool: &PgPool,
        input: &NewAccount,
    ) -> Result<Option<AccountRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO accounts (username, password_hash, roles, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (username) DO NOTHING
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(&input.username)
            .bind(&input.password_hash)
            .bind(&input.roles)
            .bind(input.created_at)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        SecurityLogRepo::create(&mut *tx, &NewSecurityLog::new(row.id, &SecurityEvent::Created))
            .await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<AccountRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<AccountRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE username = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_password_reset_token(
        pool: &PgPool,
        token: Uuid,
    ) -> Result<Option<AccountRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE password_reset_token = $1");
        sqlx::query_as::<_, AccountRow>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists_by_username(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM accounts WHERE username = $1)")
                .bind(username)
                .fetch_one(pool)
                .await?;
        Ok(exists)
    }

    /// Overwrite the mutable columns and record `events` in the same
    /// transaction. Returns `None` if the account is gone.
    pub async fn update(
        pool: &PgPool,
        account: &Account,
        events: &[SecurityEvent],
    ) -> Result<Option<AccountRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE accounts SET
                 password_hash = $2,
                 full_name = $3,
                 email_subscription_enabled = $4,
                 billing_alert_enabled = $5,
                 roles = $6,
                 password_reset_token = $7,
                 password_reset_token_expires_at = $8
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(account.id)
            .bind(&account.password_hash)
            .bind(&account.full_name)
            .bind(account.email_subscription_enabled)
            .bind(account.billing_alert_enabled)
            .bind(&account.roles)
            .bind(account.password_reset_token)
            .bind(account.password_reset_token_expires_at)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        for event in events {
            SecurityLogRepo::create(&mut *tx, &NewSecurityLog::new(row.id, event)).await?;
        }
        tx.commit().await?;
        Ok(Some(row))
    }
}
