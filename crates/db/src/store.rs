//! [`PgStore`]: the `gatekey_core::store` traits over PostgreSQL.

use async_trait::async_trait;
use gatekey_core::account::{Account, NewAccount, RefreshToken};
use gatekey_core::api_keys::{ApiKey, NewApiKey};
use gatekey_core::audit::{
    ApiKeyLog, BillingLog, NewBillingLog, NewSecurityLog, SecurityEvent, SecurityLog,
};
use gatekey_core::error::StoreError;
use gatekey_core::store::{
    AccountStore, ApiKeyStore, BillingLogStore, KeyChange, KeyEdit, RefreshTokenStore,
    SecurityLogStore, StoreResult,
};
use gatekey_core::types::{DbId, Page};
use uuid::Uuid;

use crate::repositories::{
    AccountRepo, ApiKeyRepo, BillingLogRepo, RefreshTokenRepo, SecurityLogRepo,
};
use crate::DbPool;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "Database error");
    StoreError::new(err)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[async_trait]
impl AccountStore for PgStore {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<Account>> {
        let row = AccountRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let row = AccountRepo::find_by_username(&self.pool, username)
            .await
            .map_err(store_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_password_reset_token(&self, token: Uuid) -> StoreResult<Option<Account>> {
        let row = AccountRepo::find_by_password_reset_token(&self.pool, token)
            .await
            .map_err(store_error)?;
        Ok(row.map(Into::into))
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        AccountRepo::exists_by_username(&self.pool, username)
            .await
            .map_err(store_error)
    }

    async fn insert(&self, account: NewAccount) -> StoreResult<Option<Account>> {
        let row = AccountRepo::create(&self.pool, &account)
            .await
            .map_err(store_error)?;
        Ok(row.map(Into::into))
    }

    async fn save(&self, account: &Account, events: &[SecurityEvent]) -> StoreResult<Account> {
        AccountRepo::update(&self.pool, account, events)
            .await
            .map_err(store_error)?
            .map(Into::into)
            .ok_or_else(|| StoreError::new(format!("account {} does not exist", account.id)))
    }
}

// ---------------------------------------------------------------------------
// Refresh tokens
// ---------------------------------------------------------------------------

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert(&self, token: RefreshToken) -> StoreResult<RefreshToken> {
        let row = RefreshTokenRepo::create(&self.pool, &token)
            .await
            .map_err(store_error)?;
        Ok(row.into())
    }

    async fn find_by_token(&self, token: Uuid) -> StoreResult<Option<RefreshToken>> {
        let row = RefreshTokenRepo::find_by_token(&self.pool, token)
            .await
            .map_err(store_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_by_account(&self, account_id: DbId) -> StoreResult<Vec<RefreshToken>> {
        let rows = RefreshTokenRepo::list_by_account(&self.pool, account_id)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, account_id: DbId, token: Uuid) -> StoreResult<bool> {
        RefreshTokenRepo::delete(&self.pool, account_id, token)
            .await
            .map_err(store_error)
    }

    async fn delete_all_by_account(&self, account_id: DbId) -> StoreResult<u64> {
        RefreshTokenRepo::delete_all_for_account(&self.pool, account_id)
            .await
            .map_err(store_error)
    }
}

// ---------------------------------------------------------------------------
// Security log
// ---------------------------------------------------------------------------

#[async_trait]
impl SecurityLogStore for PgStore {
    async fn record(&self, entry: NewSecurityLog) -> StoreResult<SecurityLog> {
        let row = SecurityLogRepo::create(&self.pool, &entry)
            .await
            .map_err(store_error)?;
        Ok(row.into())
    }

    async fn find_all_by_account(&self, account_id: DbId) -> StoreResult<Vec<SecurityLog>> {
        let rows = SecurityLogRepo::list_all_by_account(&self.pool, account_id)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_by_account(
        &self,
        account_id: DbId,
        page: Page,
    ) -> StoreResult<Vec<SecurityLog>> {
        let rows = SecurityLogRepo::list_by_account(&self.pool, account_id, page.limit, page.offset)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// Billing log
// ---------------------------------------------------------------------------

#[async_trait]
impl BillingLogStore for PgStore {
    async fn record(&self, entry: NewBillingLog) -> StoreResult<BillingLog> {
        let row = BillingLogRepo::create(&self.pool, &entry)
            .await
            .map_err(store_error)?;
        Ok(row.into())
    }

    async fn list_by_account(&self, account_id: DbId, page: Page) -> StoreResult<Vec<BillingLog>> {
        let rows = BillingLogRepo::list_by_account(&self.pool, account_id, page.limit, page.offset)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn count_active(&self, account_id: DbId) -> StoreResult<i64> {
        ApiKeyRepo::count_active(&self.pool, account_id)
            .await
            .map_err(store_error)
    }

    async fn find_active_by_account(&self, account_id: DbId) -> StoreResult<Vec<ApiKey>> {
        let rows = ApiKeyRepo::list_active_by_account(&self.pool, account_id)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_active(&self, account_id: DbId, key_id: DbId) -> StoreResult<Option<ApiKey>> {
        let row = ApiKeyRepo::find_active(&self.pool, account_id, key_id)
            .await
            .map_err(store_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_active_by_prefix(&self, prefix: &str) -> StoreResult<Vec<ApiKey>> {
        let rows = ApiKeyRepo::list_active_by_prefix(&self.pool, prefix)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_within_quota(
        &self,
        key: NewApiKey,
        limit: i64,
    ) -> StoreResult<Option<ApiKey>> {
        let row = ApiKeyRepo::create_within_quota(&self.pool, &key, limit)
            .await
            .map_err(store_error)?;
        Ok(row.map(Into::into))
    }

    async fn modify_active(
        &self,
        account_id: DbId,
        key_id: DbId,
        edit: KeyEdit<'_>,
        security: Option<SecurityEvent>,
    ) -> StoreResult<Option<KeyChange>> {
        let change = ApiKeyRepo::modify_active(&self.pool, account_id, key_id, edit, security.as_ref())
            .await
            .map_err(store_error)?;
        Ok(change.map(|(row, events)| KeyChange {
            key: row.into(),
            events,
        }))
    }

    async fn list_logs(&self, key_id: DbId, page: Page) -> StoreResult<Vec<ApiKeyLog>> {
        let rows = ApiKeyRepo::list_logs(&self.pool, key_id, page.limit, page.offset)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
