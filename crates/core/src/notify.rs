//! Account notifications (emails in production).
//!
//! Delivery is a collaborator concern; the services only decide *when* to
//! notify. A failed notification never fails the operation that triggered it.

use async_trait::async_trait;

use crate::account::Account;
use crate::api_keys::ApiKey;
use crate::audit::SecurityLog;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification transport error: {0}")]
    Transport(String),
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    AccountCreated,
    KeyCreated(&'a ApiKey),
    KeyDeleted(&'a ApiKey),
    /// Carries the security log entry that flagged the device.
    UnrecognizedDevice(&'a SecurityLog),
    /// Carries nothing; the reset token is on the account.
    ForgottenPassword,
    PasswordReset,
}

impl Notification<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccountCreated => "account_created",
            Self::KeyCreated(_) => "key_created",
            Self::KeyDeleted(_) => "key_deleted",
            Self::UnrecognizedDevice(_) => "unrecognized_device",
            Self::ForgottenPassword => "forgotten_password",
            Self::PasswordReset => "password_reset",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, account: &Account, notification: Notification<'_>)
        -> Result<(), NotifyError>;
}

/// Send `notification`, logging rather than propagating failure.
pub async fn dispatch(notifier: &dyn Notifier, account: &Account, notification: Notification<'_>) {
    if let Err(e) = notifier.notify(account, notification).await {
        tracing::warn!(
            account_id = account.id,
            kind = notification.kind(),
            error = %e,
            "Failed to send notification",
        );
    }
}

// ---------------------------------------------------------------------------
// TracingNotifier
// ---------------------------------------------------------------------------

/// Writes each notification to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        account: &Account,
        notification: Notification<'_>,
    ) -> Result<(), NotifyError> {
        match notification {
            Notification::KeyCreated(key) | Notification::KeyDeleted(key) => tracing::info!(
                account_id = account.id,
                kind = notification.kind(),
                api_key_id = key.id,
                prefix = %key.prefix,
                "Notification",
            ),
            Notification::UnrecognizedDevice(log) => tracing::info!(
                account_id = account.id,
                kind = notification.kind(),
                security_log_id = log.id,
                "Notification",
            ),
            _ => tracing::info!(
                account_id = account.id,
                kind = notification.kind(),
                "Notification",
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _: &Account, _: Notification<'_>) -> Result<(), NotifyError> {
            Err(NotifyError::Transport("smtp down".into()))
        }
    }

    fn account() -> Account {
        Account {
            id: 1,
            username: "ada@example.com".into(),
            password_hash: String::new(),
            full_name: None,
            email_subscription_enabled: false,
            billing_alert_enabled: false,
            roles: vec![],
            password_reset_token: None,
            password_reset_token_expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        dispatch(&FailingNotifier, &account(), Notification::AccountCreated).await;
    }

    #[tokio::test]
    async fn tracing_notifier_succeeds() {
        assert!(TracingNotifier
            .notify(&account(), Notification::PasswordReset)
            .await
            .is_ok());
    }
}
