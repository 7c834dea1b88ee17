//! Storage contracts consumed by the services.
//!
//! Implementations: [`crate::memory::MemoryStore`] and `gatekey_db::PgStore`.
//! Every method is a plain persistence operation; business rules (ownership,
//! quotas, validation) live in the services, except where atomicity forces a
//! check into the store (`insert_within_quota`, `modify_active`).
//!
//! A write that changes state also takes the audit entries describing that
//! change, and both commit or neither does.

use async_trait::async_trait;
use uuid::Uuid;

use crate::account::{Account, NewAccount, RefreshToken};
use crate::api_keys::{ApiKey, NewApiKey};
use crate::audit::{
    ApiKeyEvent, ApiKeyLog, BillingLog, NewBillingLog, NewSecurityLog, SecurityEvent, SecurityLog,
};
use crate::error::StoreError;
use crate::types::{DbId, Page};

pub type StoreResult<T> = Result<T, StoreError>;

/// Edits a locked key in place and returns the changes it made.
pub type KeyEdit<'a> = &'a (dyn Fn(&mut ApiKey) -> Vec<ApiKeyEvent> + Send + Sync);

/// Result of [`ApiKeyStore::modify_active`].
#[derive(Debug, Clone)]
pub struct KeyChange {
    pub key: ApiKey,
    /// Empty when the edit changed nothing and nothing was written.
    pub events: Vec<ApiKeyEvent>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    async fn find_by_password_reset_token(&self, token: Uuid) -> StoreResult<Option<Account>>;

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool>;

    /// Insert the account together with its `created` security log. `None`
    /// when the username is already taken.
    async fn insert(&self, account: NewAccount) -> StoreResult<Option<Account>>;

    /// Overwrite every mutable column of an existing account and record one
    /// security log per event in the same unit.
    async fn save(&self, account: &Account, events: &[SecurityEvent]) -> StoreResult<Account>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: RefreshToken) -> StoreResult<RefreshToken>;

    async fn find_by_token(&self, token: Uuid) -> StoreResult<Option<RefreshToken>>;

    /// Every token of the account, expired ones included.
    async fn list_by_account(&self, account_id: DbId) -> StoreResult<Vec<RefreshToken>>;

    /// `false` when the account holds no such token.
    async fn delete(&self, account_id: DbId, token: Uuid) -> StoreResult<bool>;

    async fn delete_all_by_account(&self, account_id: DbId) -> StoreResult<u64>;
}

#[async_trait]
pub trait SecurityLogStore: Send + Sync {
    async fn record(&self, entry: NewSecurityLog) -> StoreResult<SecurityLog>;

    async fn find_all_by_account(&self, account_id: DbId) -> StoreResult<Vec<SecurityLog>>;

    /// Newest first.
    async fn list_by_account(&self, account_id: DbId, page: Page)
        -> StoreResult<Vec<SecurityLog>>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Non-deleted keys of the account.
    async fn count_active(&self, account_id: DbId) -> StoreResult<i64>;

    async fn find_active_by_account(&self, account_id: DbId) -> StoreResult<Vec<ApiKey>>;

    /// The key only if it belongs to `account_id` and is not deleted.
    async fn find_active(&self, account_id: DbId, key_id: DbId) -> StoreResult<Option<ApiKey>>;

    async fn find_active_by_prefix(&self, prefix: &str) -> StoreResult<Vec<ApiKey>>;

    /// Insert the key, its `created` log and the account's `create_key`
    /// security log unless the account already holds `limit` non-deleted
    /// keys, in which case nothing is written and `None` is returned. The
    /// count and the insert are serialized per account.
    async fn insert_within_quota(&self, key: NewApiKey, limit: i64)
        -> StoreResult<Option<ApiKey>>;

    /// Lock the account's non-deleted key, run `edit` on the locked copy and
    /// persist the result with one key log per returned event, plus
    /// `security` when given. Read, edit and write are one unit; concurrent
    /// modifications of a key run one after the other. Nothing is written
    /// when `edit` returns no events. `None` when no such key exists.
    async fn modify_active(
        &self,
        account_id: DbId,
        key_id: DbId,
        edit: KeyEdit<'_>,
        security: Option<SecurityEvent>,
    ) -> StoreResult<Option<KeyChange>>;

    /// Newest first.
    async fn list_logs(&self, key_id: DbId, page: Page) -> StoreResult<Vec<ApiKeyLog>>;
}

/// Usage charges recorded by the billing collaborator.
#[async_trait]
pub trait BillingLogStore: Send + Sync {
    async fn record(&self, entry: NewBillingLog) -> StoreResult<BillingLog>;

    /// Newest first.
    async fn list_by_account(&self, account_id: DbId, page: Page) -> StoreResult<Vec<BillingLog>>;
}
