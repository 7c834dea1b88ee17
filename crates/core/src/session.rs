//! Account sessions: signup, signin, devices, password reset and profile.

use std::sync::{Arc, OnceLock};

use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::account::{
    Account, AccountPatch, AuthTokens, NewAccount, Principal, RefreshToken,
    PASSWORD_RESET_TOKEN_TTL_HOURS,
};
use crate::audit::{BillingLog, SecurityEvent, SecurityLog};
use crate::error::{CoreError, CoreResult};
use crate::fingerprint::RequestMetadata;
use crate::hashing::{validate_password_strength, SecretHasher, MIN_PASSWORD_LENGTH};
use crate::jwt::{generate_access_token, validate_token, JwtConfig};
use crate::notify::{dispatch, Notification, Notifier};
use crate::origin::OriginVerifier;
use crate::roles::ROLE_ADMIN;
use crate::store::{AccountStore, BillingLogStore, RefreshTokenStore, SecurityLogStore};
use crate::types::Page;

/// Default refresh token (device) lifetime in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 30;

/// Verified against when the username is unknown, so both failure paths cost
/// one hash verification.
const DUMMY_PASSWORD: &str = "dummy-password-for-unknown-accounts";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jwt: JwtConfig,
    pub refresh_token_expiry_days: i64,
    pub min_password_length: usize,
    /// Role granted to every new account.
    pub default_role: String,
}

impl SessionConfig {
    /// Load session configuration from environment variables.
    ///
    /// | Env Var                     | Required | Default |
    /// |-----------------------------|----------|---------|
    /// | `JWT_SECRET`                | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`    | no       | `60`    |
    /// | `REFRESH_TOKEN_EXPIRY_DAYS` | no       | `30`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or a numeric variable does not parse.
    pub fn from_env() -> Self {
        let refresh_token_expiry_days: i64 = std::env::var("REFRESH_TOKEN_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_DAYS.to_string())
            .parse()
            .expect("REFRESH_TOKEN_EXPIRY_DAYS must be a valid i64");

        Self {
            jwt: JwtConfig::from_env(),
            refresh_token_expiry_days,
            min_password_length: MIN_PASSWORD_LENGTH,
            default_role: ROLE_ADMIN.to_string(),
        }
    }

    pub fn with_jwt(jwt: JwtConfig) -> Self {
        Self {
            jwt,
            refresh_token_expiry_days: DEFAULT_REFRESH_EXPIRY_DAYS,
            min_password_length: MIN_PASSWORD_LENGTH,
            default_role: ROLE_ADMIN.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SessionIssuer {
    accounts: Arc<dyn AccountStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    security_logs: Arc<dyn SecurityLogStore>,
    billing_logs: Arc<dyn BillingLogStore>,
    notifier: Arc<dyn Notifier>,
    hasher: Arc<dyn SecretHasher>,
    origin: OriginVerifier,
    config: SessionConfig,
    dummy_digest: Arc<OnceLock<String>>,
}

impl SessionIssuer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        security_logs: Arc<dyn SecurityLogStore>,
        billing_logs: Arc<dyn BillingLogStore>,
        notifier: Arc<dyn Notifier>,
        hasher: Arc<dyn SecretHasher>,
        origin: OriginVerifier,
        config: SessionConfig,
    ) -> Self {
        Self {
            accounts,
            refresh_tokens,
            security_logs,
            billing_logs,
            notifier,
            hasher,
            origin,
            config,
            dummy_digest: Arc::new(OnceLock::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Sign in / sign up
    // -----------------------------------------------------------------------

    /// Unknown usernames and wrong passwords fail identically with
    /// [`CoreError::InvalidCredentials`].
    pub async fn signin(
        &self,
        username: &str,
        password: &str,
        fingerprint: Option<RequestMetadata>,
    ) -> CoreResult<AuthTokens> {
        let Some(account) = self.accounts.find_by_username(username).await? else {
            let digest = self.dummy_digest()?;
            let _ = self.hasher.verify(password, digest)?;
            return Err(CoreError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &account.password_hash)? {
            tracing::debug!(account_id = account.id, "Sign-in rejected: wrong password");
            return Err(CoreError::InvalidCredentials);
        }

        let access_token = self.access_token(&account.username, &account.roles)?;

        if let Some(metadata) = &fingerprint {
            self.origin.verify(&account, metadata).await;
        }

        let now = Utc::now();
        let device = self
            .refresh_tokens
            .insert(RefreshToken {
                token: Uuid::new_v4(),
                account_id: account.id,
                created_at: now,
                expires_at: now + Duration::days(self.config.refresh_token_expiry_days),
                request_metadata: fingerprint,
            })
            .await?;

        tracing::info!(account_id = account.id, "Account signed in");
        Ok(AuthTokens {
            access_token,
            refresh_token: Some(device.token),
            expires_in: self.config.jwt.expires_in(),
        })
    }

    /// Creates the account and returns an access token. No device is
    /// registered until the first sign-in. The `created` security event is
    /// written by the same store call as the account.
    pub async fn signup(&self, username: &str, password: &str) -> CoreResult<AuthTokens> {
        if !username.validate_email() {
            return Err(CoreError::Validation(
                "Username must be a valid email address".into(),
            ));
        }
        validate_password_strength(password, self.config.min_password_length)?;

        if self.accounts.exists_by_username(username).await? {
            return Err(CoreError::UsernameUnavailable);
        }

        let password_hash = self.hasher.hash(password)?;
        let account = self
            .accounts
            .insert(NewAccount {
                username: username.to_string(),
                password_hash,
                roles: vec![self.config.default_role.clone()],
                created_at: Utc::now(),
            })
            .await?
            .ok_or(CoreError::UsernameUnavailable)?;

        dispatch(self.notifier.as_ref(), &account, Notification::AccountCreated).await;

        tracing::info!(account_id = account.id, "Account created");
        Ok(AuthTokens {
            access_token: self.access_token(&account.username, &account.roles)?,
            refresh_token: None,
            expires_in: self.config.jwt.expires_in(),
        })
    }

    /// Exchange an active refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: Uuid) -> CoreResult<AuthTokens> {
        let device = self
            .refresh_tokens
            .find_by_token(refresh_token)
            .await?
            .filter(|device| device.is_active(Utc::now()))
            .ok_or(CoreError::InvalidCredentials)?;

        let account = self
            .accounts
            .find_by_id(device.account_id)
            .await?
            .ok_or(CoreError::InvalidCredentials)?;

        Ok(AuthTokens {
            access_token: self.access_token(&account.username, &account.roles)?,
            refresh_token: Some(device.token),
            expires_in: self.config.jwt.expires_in(),
        })
    }

    pub fn authenticate_bearer(&self, token: &str) -> CoreResult<Principal> {
        let claims = validate_token(token, &self.config.jwt).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            CoreError::InvalidToken
        })?;
        Ok(Principal {
            username: claims.sub,
            roles: claims.roles,
        })
    }

    // -----------------------------------------------------------------------
    // Password reset
    // -----------------------------------------------------------------------

    /// Issue a single-use reset token valid for 24 hours, replacing any
    /// earlier one.
    pub async fn create_password_reset_token(&self, username: &str) -> CoreResult<Account> {
        let mut account = self.find_account(username).await?;
        account.set_password_reset_token(
            Uuid::new_v4(),
            Utc::now() + Duration::hours(PASSWORD_RESET_TOKEN_TTL_HOURS),
        );
        let account = self.accounts.save(&account, &[]).await?;

        dispatch(self.notifier.as_ref(), &account, Notification::ForgottenPassword).await;
        tracing::info!(account_id = account.id, "Password reset token issued");
        Ok(account)
    }

    pub async fn reset_password(&self, new_password: &str, token: Uuid) -> CoreResult<Account> {
        let mut account = self
            .accounts
            .find_by_password_reset_token(token)
            .await?
            .ok_or(CoreError::TokenNotFound)?;

        let expired = account
            .password_reset_token_expires_at
            .map_or(true, |expires_at| Utc::now() > expires_at);
        if expired {
            return Err(CoreError::TokenExpired);
        }

        validate_password_strength(new_password, self.config.min_password_length)?;

        account.password_hash = self.hasher.hash(new_password)?;
        account.clear_password_reset_token();
        let account = self.accounts.save(&account, &[SecurityEvent::Reset]).await?;

        dispatch(self.notifier.as_ref(), &account, Notification::PasswordReset).await;
        tracing::info!(account_id = account.id, "Password reset");
        Ok(account)
    }

    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    /// Devices whose refresh token has not expired. Expired ones are hidden,
    /// not deleted.
    pub async fn list_active_devices(&self, username: &str) -> CoreResult<Vec<RefreshToken>> {
        let account = self.find_account(username).await?;
        let now = Utc::now();
        let devices = self.refresh_tokens.list_by_account(account.id).await?;
        Ok(devices.into_iter().filter(|d| d.is_active(now)).collect())
    }

    pub async fn revoke_device(&self, username: &str, token: Uuid) -> CoreResult<()> {
        let account = self.find_account(username).await?;
        if !self.refresh_tokens.delete(account.id, token).await? {
            return Err(CoreError::NotFound {
                entity: "device",
                key: token.to_string(),
            });
        }
        tracing::info!(account_id = account.id, "Device signed out");
        Ok(())
    }

    /// Sign out everywhere. Returns the number of devices removed.
    pub async fn revoke_all_devices(&self, username: &str) -> CoreResult<u64> {
        let account = self.find_account(username).await?;
        let removed = self.refresh_tokens.delete_all_by_account(account.id).await?;
        tracing::info!(account_id = account.id, removed, "All devices signed out");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Profile
    // -----------------------------------------------------------------------

    pub async fn find_account(&self, username: &str) -> CoreResult<Account> {
        self.accounts
            .find_by_username(username)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "account",
                key: username.to_string(),
            })
    }

    /// Apply the supplied, differing fields. Each change gets its own
    /// security log entry, saved with the account; no change means no write.
    pub async fn update_account(&self, username: &str, patch: AccountPatch) -> CoreResult<Account> {
        let mut account = self.find_account(username).await?;
        let mut events = Vec::new();

        if let Some(full_name) = patch.full_name.changed_from(&account.full_name) {
            account.full_name.clone_from(full_name);
            events.push(SecurityEvent::FullName);
        }
        if let Some(&enabled) = patch
            .billing_alert_enabled
            .changed_from(&account.billing_alert_enabled)
        {
            account.billing_alert_enabled = enabled;
            events.push(SecurityEvent::BillingAlertEnabled(enabled));
        }
        if let Some(&enabled) = patch
            .email_subscription_enabled
            .changed_from(&account.email_subscription_enabled)
        {
            account.email_subscription_enabled = enabled;
            events.push(SecurityEvent::EmailSubscriptionEnabled(enabled));
        }

        if events.is_empty() {
            return Ok(account);
        }

        Ok(self.accounts.save(&account, &events).await?)
    }

    pub async fn security_logs(&self, username: &str, page: Page) -> CoreResult<Vec<SecurityLog>> {
        let account = self.find_account(username).await?;
        Ok(self.security_logs.list_by_account(account.id, page).await?)
    }

    /// Usage charges recorded for the account, newest first.
    pub async fn billing_logs(&self, username: &str, page: Page) -> CoreResult<Vec<BillingLog>> {
        let account = self.find_account(username).await?;
        Ok(self.billing_logs.list_by_account(account.id, page).await?)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn access_token(&self, username: &str, roles: &[String]) -> CoreResult<String> {
        generate_access_token(username, roles, &self.config.jwt)
            .map_err(|e| CoreError::Internal(format!("Token generation error: {e}")))
    }

    fn dummy_digest(&self) -> CoreResult<&str> {
        if let Some(digest) = self.dummy_digest.get() {
            return Ok(digest);
        }
        let digest = self.hasher.hash(DUMMY_PASSWORD)?;
        Ok(self.dummy_digest.get_or_init(|| digest))
    }
}
