//! In-memory implementation of every store trait.
//!
//! One mutex guards all tables, so each trait method is atomic with respect
//! to every other, which is what `insert_within_quota` and `modify_active`
//! require.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::account::{Account, NewAccount, RefreshToken};
use crate::api_keys::{ApiKey, NewApiKey};
use crate::audit::{
    ApiKeyEvent, ApiKeyLog, BillingLog, NewBillingLog, NewSecurityLog, SecurityEvent, SecurityLog,
};
use crate::error::StoreError;
use crate::store::{
    AccountStore, ApiKeyStore, BillingLogStore, KeyChange, KeyEdit, RefreshTokenStore,
    SecurityLogStore, StoreResult,
};
use crate::types::{DbId, Page};

#[derive(Default)]
struct Tables {
    last_id: DbId,
    accounts: Vec<Account>,
    refresh_tokens: Vec<RefreshToken>,
    security_logs: Vec<SecurityLog>,
    billing_logs: Vec<BillingLog>,
    api_keys: Vec<ApiKey>,
    api_key_logs: Vec<ApiKeyLog>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }

    fn active_key_mut(&mut self, account_id: DbId, key_id: DbId) -> Option<&mut ApiKey> {
        self.api_keys
            .iter_mut()
            .find(|k| k.id == key_id && k.account_id == account_id && !k.is_deleted())
    }

    fn push_security_log(&mut self, entry: NewSecurityLog) -> SecurityLog {
        let log = SecurityLog {
            id: self.next_id(),
            account_id: entry.account_id,
            action: entry.action,
            request_metadata: entry.request_metadata,
            created_at: entry.created_at,
        };
        self.security_logs.push(log.clone());
        log
    }

    fn push_key_log(&mut self, api_key_id: DbId, event: &ApiKeyEvent) {
        let id = self.next_id();
        self.api_key_logs.push(ApiKeyLog {
            id,
            api_key_id,
            action: event.to_string(),
            created_at: Utc::now(),
        });
    }
}

/// Newest-first window over rows stored in insertion order.
fn page_newest_first<T>(rows: impl DoubleEndedIterator<Item = T>, page: Page) -> Vec<T> {
    rows.rev()
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<Account>> {
        let tables = self.tables.lock().await;
        Ok(tables.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_by_password_reset_token(&self, token: Uuid) -> StoreResult<Option<Account>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .iter()
            .find(|a| a.password_reset_token == Some(token))
            .cloned())
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.accounts.iter().any(|a| a.username == username))
    }

    async fn insert(&self, account: NewAccount) -> StoreResult<Option<Account>> {
        let mut tables = self.tables.lock().await;
        if tables.accounts.iter().any(|a| a.username == account.username) {
            return Ok(None);
        }
        let account = Account {
            id: tables.next_id(),
            username: account.username,
            password_hash: account.password_hash,
            full_name: None,
            email_subscription_enabled: false,
            billing_alert_enabled: false,
            roles: account.roles,
            password_reset_token: None,
            password_reset_token_expires_at: None,
            created_at: account.created_at,
        };
        tables.accounts.push(account.clone());
        tables.push_security_log(NewSecurityLog::new(account.id, &SecurityEvent::Created));
        Ok(Some(account))
    }

    async fn save(&self, account: &Account, events: &[SecurityEvent]) -> StoreResult<Account> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.accounts.iter_mut().find(|a| a.id == account.id) else {
            return Err(StoreError::new(format!(
                "account {} does not exist",
                account.id
            )));
        };
        *existing = account.clone();
        for event in events {
            tables.push_security_log(NewSecurityLog::new(account.id, event));
        }
        Ok(account.clone())
    }
}

// ---------------------------------------------------------------------------
// Refresh tokens
// ---------------------------------------------------------------------------

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert(&self, token: RefreshToken) -> StoreResult<RefreshToken> {
        let mut tables = self.tables.lock().await;
        tables.refresh_tokens.push(token.clone());
        Ok(token)
    }

    async fn find_by_token(&self, token: Uuid) -> StoreResult<Option<RefreshToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .refresh_tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn list_by_account(&self, account_id: DbId) -> StoreResult<Vec<RefreshToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .refresh_tokens
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, account_id: DbId, token: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.refresh_tokens.len();
        tables
            .refresh_tokens
            .retain(|t| !(t.account_id == account_id && t.token == token));
        Ok(tables.refresh_tokens.len() < before)
    }

    async fn delete_all_by_account(&self, account_id: DbId) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|t| t.account_id != account_id);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Security log
// ---------------------------------------------------------------------------

#[async_trait]
impl SecurityLogStore for MemoryStore {
    async fn record(&self, entry: NewSecurityLog) -> StoreResult<SecurityLog> {
        let mut tables = self.tables.lock().await;
        Ok(tables.push_security_log(entry))
    }

    async fn find_all_by_account(&self, account_id: DbId) -> StoreResult<Vec<SecurityLog>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .security_logs
            .iter()
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn list_by_account(
        &self,
        account_id: DbId,
        page: Page,
    ) -> StoreResult<Vec<SecurityLog>> {
        let tables = self.tables.lock().await;
        Ok(page_newest_first(
            tables
                .security_logs
                .iter()
                .filter(|l| l.account_id == account_id)
                .cloned(),
            page,
        ))
    }
}

// ---------------------------------------------------------------------------
// Billing log
// ---------------------------------------------------------------------------

#[async_trait]
impl BillingLogStore for MemoryStore {
    async fn record(&self, entry: NewBillingLog) -> StoreResult<BillingLog> {
        let mut tables = self.tables.lock().await;
        let log = BillingLog {
            id: tables.next_id(),
            account_id: entry.account_id,
            action: entry.action,
            amount: entry.amount,
            created_at: entry.created_at,
        };
        tables.billing_logs.push(log.clone());
        Ok(log)
    }

    async fn list_by_account(&self, account_id: DbId, page: Page) -> StoreResult<Vec<BillingLog>> {
        let tables = self.tables.lock().await;
        Ok(page_newest_first(
            tables
                .billing_logs
                .iter()
                .filter(|l| l.account_id == account_id)
                .cloned(),
            page,
        ))
    }
}

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn count_active(&self, account_id: DbId) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .api_keys
            .iter()
            .filter(|k| k.account_id == account_id && !k.is_deleted())
            .count() as i64)
    }

    async fn find_active_by_account(&self, account_id: DbId) -> StoreResult<Vec<ApiKey>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .api_keys
            .iter()
            .filter(|k| k.account_id == account_id && !k.is_deleted())
            .cloned()
            .collect())
    }

    async fn find_active(&self, account_id: DbId, key_id: DbId) -> StoreResult<Option<ApiKey>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.active_key_mut(account_id, key_id).cloned())
    }

    async fn find_active_by_prefix(&self, prefix: &str) -> StoreResult<Vec<ApiKey>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .api_keys
            .iter()
            .filter(|k| k.prefix == prefix && !k.is_deleted())
            .cloned()
            .collect())
    }

    async fn insert_within_quota(
        &self,
        key: NewApiKey,
        limit: i64,
    ) -> StoreResult<Option<ApiKey>> {
        let mut tables = self.tables.lock().await;
        let active = tables
            .api_keys
            .iter()
            .filter(|k| k.account_id == key.account_id && !k.is_deleted())
            .count() as i64;
        if active >= limit {
            return Ok(None);
        }

        let key = ApiKey {
            id: tables.next_id(),
            account_id: key.account_id,
            name: key.name,
            prefix: key.prefix,
            hash: key.hash,
            enabled: key.enabled,
            scope: key.scope,
            access_policies: key.access_policies,
            created_at: key.created_at,
            modified_at: None,
            deleted_at: None,
        };
        tables.api_keys.push(key.clone());
        tables.push_key_log(key.id, &ApiKeyEvent::Created);
        tables.push_security_log(NewSecurityLog::new(
            key.account_id,
            &SecurityEvent::CreateKey { key_id: key.id },
        ));
        Ok(Some(key))
    }

    async fn modify_active(
        &self,
        account_id: DbId,
        key_id: DbId,
        edit: KeyEdit<'_>,
        security: Option<SecurityEvent>,
    ) -> StoreResult<Option<KeyChange>> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.active_key_mut(account_id, key_id) else {
            return Ok(None);
        };

        let mut key = existing.clone();
        let events = edit(&mut key);
        if events.is_empty() {
            return Ok(Some(KeyChange { key, events }));
        }

        *existing = key.clone();
        for event in &events {
            tables.push_key_log(key_id, event);
        }
        if let Some(event) = security {
            tables.push_security_log(NewSecurityLog::new(account_id, &event));
        }
        Ok(Some(KeyChange { key, events }))
    }

    async fn list_logs(&self, key_id: DbId, page: Page) -> StoreResult<Vec<ApiKeyLog>> {
        let tables = self.tables.lock().await;
        Ok(page_newest_first(
            tables
                .api_key_logs
                .iter()
                .filter(|l| l.api_key_id == key_id)
                .cloned(),
            page,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_keys::Scope;
    use chrono::Duration;

    fn new_key(account_id: DbId, prefix: &str) -> NewApiKey {
        NewApiKey {
            account_id,
            name: "k".into(),
            prefix: prefix.into(),
            hash: "h".into(),
            enabled: false,
            scope: Scope::default(),
            access_policies: vec![],
            created_at: Utc::now(),
        }
    }

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.into(),
            password_hash: "h".into(),
            roles: vec!["admin".into()],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = MemoryStore::new();
        assert!(AccountStore::insert(&store, new_account("a@example.com"))
            .await
            .unwrap()
            .is_some());
        assert!(AccountStore::insert(&store, new_account("a@example.com"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn quota_is_enforced_per_account() {
        let store = MemoryStore::new();
        assert!(store.insert_within_quota(new_key(1, "a"), 1).await.unwrap().is_some());
        assert!(store.insert_within_quota(new_key(1, "b"), 1).await.unwrap().is_none());
        assert!(store.insert_within_quota(new_key(2, "c"), 1).await.unwrap().is_some());
        assert_eq!(store.count_active(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn insert_within_quota_records_security_event() {
        let store = MemoryStore::new();
        let key = store
            .insert_within_quota(new_key(1, "a"), 10)
            .await
            .unwrap()
            .unwrap();

        let security = store.find_all_by_account(1).await.unwrap();
        let actions: Vec<&str> = security.iter().map(|l| l.action.as_str()).collect();
        assert_eq!(actions, vec![format!("create_key.{}", key.id)]);
    }

    #[tokio::test]
    async fn modify_active_writes_logs_and_soft_delete_hides_key() {
        let store = MemoryStore::new();
        let key = store
            .insert_within_quota(new_key(1, "a"), 10)
            .await
            .unwrap()
            .unwrap();

        let soft_delete = |k: &mut ApiKey| {
            k.deleted_at = Some(Utc::now());
            vec![ApiKeyEvent::Deleted]
        };
        let change = store
            .modify_active(1, key.id, &soft_delete, Some(SecurityEvent::DeleteKey { key_id: key.id }))
            .await
            .unwrap()
            .unwrap();
        assert!(change.key.is_deleted());

        assert!(store.find_active(1, key.id).await.unwrap().is_none());
        assert!(store.find_active_by_prefix("a").await.unwrap().is_empty());
        assert_eq!(store.count_active(1).await.unwrap(), 0);

        let logs = store.list_logs(key.id, Page::default()).await.unwrap();
        let actions: Vec<&str> = logs.iter().map(|l| l.action.as_str()).collect();
        assert_eq!(actions, vec!["delete_key", "created"]);

        let security = store.find_all_by_account(1).await.unwrap();
        assert_eq!(security.last().unwrap().action, format!("delete_key.{}", key.id));

        assert!(store
            .modify_active(1, key.id, &soft_delete, None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn modify_active_without_events_writes_nothing() {
        let store = MemoryStore::new();
        let key = store
            .insert_within_quota(new_key(1, "a"), 10)
            .await
            .unwrap()
            .unwrap();

        let rename_without_reporting = |k: &mut ApiKey| {
            k.name = "ignored".into();
            Vec::new()
        };
        let change = store
            .modify_active(1, key.id, &rename_without_reporting, Some(SecurityEvent::Reset))
            .await
            .unwrap()
            .unwrap();
        assert!(change.events.is_empty());

        assert_eq!(store.find_active(1, key.id).await.unwrap().unwrap().name, "k");
        assert_eq!(store.list_logs(key.id, Page::default()).await.unwrap().len(), 1);
        assert_eq!(store.find_all_by_account(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn account_insert_and_save_record_security_events() {
        let store = MemoryStore::new();
        let mut account = AccountStore::insert(&store, new_account("a@example.com"))
            .await
            .unwrap()
            .unwrap();

        account.full_name = Some("Ada".into());
        store.save(&account, &[SecurityEvent::FullName]).await.unwrap();

        let actions: Vec<String> = store
            .find_all_by_account(account.id)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.action)
            .collect();
        assert_eq!(actions, vec!["created", "fullname"]);
    }

    #[tokio::test]
    async fn billing_log_paging_is_per_account() {
        let store = MemoryStore::new();
        for (account_id, amount) in [(1, "1.00"), (2, "9.99"), (1, "2.50")] {
            BillingLogStore::record(&store, NewBillingLog::new(account_id, "usage", amount))
                .await
                .unwrap();
        }
        let page = BillingLogStore::list_by_account(&store, 1, Page::default())
            .await
            .unwrap();
        let amounts: Vec<&str> = page.iter().map(|l| l.amount.as_str()).collect();
        assert_eq!(amounts, vec!["2.50", "1.00"]);
    }

    #[tokio::test]
    async fn refresh_token_delete_is_scoped_to_account() {
        let store = MemoryStore::new();
        let token = RefreshToken {
            token: Uuid::new_v4(),
            account_id: 1,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(1),
            request_metadata: None,
        };
        RefreshTokenStore::insert(&store, token.clone()).await.unwrap();

        assert!(!RefreshTokenStore::delete(&store, 2, token.token).await.unwrap());
        assert!(RefreshTokenStore::delete(&store, 1, token.token).await.unwrap());
        assert!(store.find_by_token(token.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn security_log_paging_is_newest_first() {
        let store = MemoryStore::new();
        for action in ["one", "two", "three"] {
            let entry = NewSecurityLog {
                account_id: 1,
                action: action.into(),
                request_metadata: None,
                created_at: Utc::now(),
            };
            SecurityLogStore::record(&store, entry).await.unwrap();
        }
        let page = SecurityLogStore::list_by_account(&store, 1, Page { limit: 2, offset: 0 })
            .await
            .unwrap();
        let actions: Vec<&str> = page.iter().map(|l| l.action.as_str()).collect();
        assert_eq!(actions, vec!["three", "two"]);
    }
}
