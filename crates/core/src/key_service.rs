//! API key issuance, management and authentication.
//!
//! Keys move `enabled <-> disabled -> deleted`; deletion is a tombstone and
//! terminal. Every change is written to the key's own log, atomically with
//! the change itself. Changes are computed against the key as locked by the
//! store, never against an earlier read.

use std::sync::Arc;

use chrono::Utc;

use crate::account::Account;
use crate::api_keys::{
    apply_update, extract_prefix, generate_api_key, validate_key_name, validate_policies, ApiKey,
    CreateApiKey, CreatedApiKey, NewApiKey, UpdateApiKey, DEFAULT_KEY_LIMIT,
};
use crate::audit::{ApiKeyEvent, ApiKeyLog, SecurityEvent};
use crate::error::{CoreError, CoreResult};
use crate::hashing::SecretHasher;
use crate::notify::{dispatch, Notification, Notifier};
use crate::store::{AccountStore, ApiKeyStore};
use crate::types::{DbId, Page};

#[derive(Debug, Clone)]
pub struct KeyConfig {
    /// Maximum non-deleted keys per account.
    pub key_limit: i64,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_limit: DEFAULT_KEY_LIMIT,
        }
    }
}

impl KeyConfig {
    /// | Env Var         | Required | Default |
    /// |-----------------|----------|---------|
    /// | `API_KEY_LIMIT` | no       | `10`    |
    pub fn from_env() -> Self {
        let key_limit: i64 = std::env::var("API_KEY_LIMIT")
            .unwrap_or_else(|_| DEFAULT_KEY_LIMIT.to_string())
            .parse()
            .expect("API_KEY_LIMIT must be a valid i64");
        Self { key_limit }
    }
}

#[derive(Clone)]
pub struct ApiKeyService {
    accounts: Arc<dyn AccountStore>,
    keys: Arc<dyn ApiKeyStore>,
    notifier: Arc<dyn Notifier>,
    hasher: Arc<dyn SecretHasher>,
    config: KeyConfig,
}

impl ApiKeyService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        keys: Arc<dyn ApiKeyStore>,
        notifier: Arc<dyn Notifier>,
        hasher: Arc<dyn SecretHasher>,
        config: KeyConfig,
    ) -> Self {
        Self {
            accounts,
            keys,
            notifier,
            hasher,
            config,
        }
    }

    /// The key, its `created` log and the `create_key` security event are
    /// written in one store call, so an error means nothing was persisted.
    pub async fn create(&self, username: &str, request: CreateApiKey) -> CoreResult<CreatedApiKey> {
        validate_key_name(&request.name)?;
        let access_policies = request.access_policies.unwrap_or_default();
        validate_policies(&access_policies)?;

        let account = self.account(username).await?;
        let generated = generate_api_key();
        let hash = self.hasher.hash(&generated.plaintext)?;

        let new_key = NewApiKey {
            account_id: account.id,
            name: request.name,
            prefix: generated.prefix,
            hash,
            enabled: request.enabled.unwrap_or(false),
            scope: request.scope.unwrap_or_default(),
            access_policies,
            created_at: Utc::now(),
        };

        let key = self
            .keys
            .insert_within_quota(new_key, self.config.key_limit)
            .await?
            .ok_or(CoreError::QuotaExceeded {
                limit: self.config.key_limit,
            })?;

        dispatch(self.notifier.as_ref(), &account, Notification::KeyCreated(&key)).await;

        tracing::info!(
            account_id = account.id,
            api_key_id = key.id,
            prefix = %key.prefix,
            "API key created",
        );
        Ok(CreatedApiKey {
            key,
            plaintext: generated.plaintext,
        })
    }

    /// Apply the supplied, differing fields. Nothing is written when nothing
    /// changes, `modified_at` included. The diff runs against the locked row,
    /// so concurrent updates of one key serialize and none is lost.
    pub async fn update(
        &self,
        username: &str,
        key_id: DbId,
        update: UpdateApiKey,
    ) -> CoreResult<ApiKey> {
        update.validate()?;
        let account = self.account(username).await?;

        let now = Utc::now();
        let edit = |key: &mut ApiKey| {
            let events = apply_update(key, &update);
            if !events.is_empty() {
                key.modified_at = Some(now);
            }
            events
        };
        let change = self
            .keys
            .modify_active(account.id, key_id, &edit, None)
            .await?
            .ok_or(CoreError::KeyNotFound { id: key_id })?;

        if !change.events.is_empty() {
            tracing::info!(
                account_id = account.id,
                api_key_id = key_id,
                changes = change.events.len(),
                "API key updated",
            );
        }
        Ok(change.key)
    }

    /// Soft delete. The key stops authenticating and no longer counts toward
    /// the quota. The tombstone, its key log and the `delete_key` security
    /// event commit together.
    pub async fn delete(&self, username: &str, key_id: DbId) -> CoreResult<()> {
        let account = self.account(username).await?;

        let deleted_at = Utc::now();
        let soft_delete = |key: &mut ApiKey| {
            key.deleted_at = Some(deleted_at);
            vec![ApiKeyEvent::Deleted]
        };
        let change = self
            .keys
            .modify_active(
                account.id,
                key_id,
                &soft_delete,
                Some(SecurityEvent::DeleteKey { key_id }),
            )
            .await?
            .ok_or(CoreError::KeyNotFound { id: key_id })?;

        dispatch(self.notifier.as_ref(), &account, Notification::KeyDeleted(&change.key)).await;

        tracing::info!(account_id = account.id, api_key_id = key_id, "API key deleted");
        Ok(())
    }

    /// Resolve a raw key to its record. Disabled keys still authenticate;
    /// enforcing `enabled` and access policies is the caller's concern.
    ///
    /// A stored digest that cannot be parsed counts as a mismatch so one bad
    /// row cannot lock out the other keys sharing its prefix.
    pub async fn authenticate(&self, raw_key: &str) -> CoreResult<Option<ApiKey>> {
        let Some(prefix) = extract_prefix(raw_key) else {
            return Ok(None);
        };

        for candidate in self.keys.find_active_by_prefix(prefix).await? {
            match self.hasher.verify(raw_key, &candidate.hash) {
                Ok(true) => return Ok(Some(candidate)),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        api_key_id = candidate.id,
                        error = %e,
                        "Stored API key digest could not be verified",
                    );
                }
            }
        }

        tracing::debug!(prefix, "API key authentication failed");
        Ok(None)
    }

    pub async fn count(&self, username: &str) -> CoreResult<i64> {
        let account = self.account(username).await?;
        Ok(self.keys.count_active(account.id).await?)
    }

    pub async fn find_all(&self, username: &str) -> CoreResult<Vec<ApiKey>> {
        let account = self.account(username).await?;
        Ok(self.keys.find_active_by_account(account.id).await?)
    }

    pub async fn find_by_id(&self, username: &str, key_id: DbId) -> CoreResult<ApiKey> {
        let account = self.account(username).await?;
        self.owned_key(&account, key_id).await
    }

    pub async fn logs(&self, username: &str, key_id: DbId, page: Page) -> CoreResult<Vec<ApiKeyLog>> {
        let account = self.account(username).await?;
        let key = self.owned_key(&account, key_id).await?;
        Ok(self.keys.list_logs(key.id, page).await?)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn account(&self, username: &str) -> CoreResult<Account> {
        self.accounts
            .find_by_username(username)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "account",
                key: username.to_string(),
            })
    }

    /// Missing, foreign and deleted keys are indistinguishable.
    async fn owned_key(&self, account: &Account, key_id: DbId) -> CoreResult<ApiKey> {
        self.keys
            .find_active(account.id, key_id)
            .await?
            .ok_or(CoreError::KeyNotFound { id: key_id })
    }
}
