//! Sign-in origin verification.
//!
//! Compares a sign-in's fingerprint against every fingerprint previously seen
//! on the account. Unfamiliar origins are logged and the account owner is
//! notified; familiar ones are logged as a plain sign-in.

use std::sync::Arc;

use crate::account::Account;
use crate::audit::{NewSecurityLog, SecurityEvent, SecurityLog};
use crate::error::CoreResult;
use crate::fingerprint::RequestMetadata;
use crate::notify::{dispatch, Notification, Notifier};
use crate::store::SecurityLogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceVerdict {
    /// A prior log entry has the same geo and device.
    Recognized,
    /// First sighting; flagged and notified.
    Unrecognized,
    /// The check could not complete; nothing was concluded.
    Unverified,
}

#[derive(Clone)]
pub struct OriginVerifier {
    security_logs: Arc<dyn SecurityLogStore>,
    notifier: Arc<dyn Notifier>,
}

impl OriginVerifier {
    pub fn new(security_logs: Arc<dyn SecurityLogStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            security_logs,
            notifier,
        }
    }

    /// Never fails: storage errors are logged and reported as
    /// [`DeviceVerdict::Unverified`].
    pub async fn verify(&self, account: &Account, metadata: &RequestMetadata) -> DeviceVerdict {
        match self.check(account, metadata).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(account_id = account.id, error = %e, "Origin verification failed");
                DeviceVerdict::Unverified
            }
        }
    }

    async fn check(&self, account: &Account, metadata: &RequestMetadata) -> CoreResult<DeviceVerdict> {
        let history = self.security_logs.find_all_by_account(account.id).await?;
        let seen = history
            .iter()
            .filter_map(|log| log.request_metadata.as_ref())
            .any(|previous| previous.same_origin(metadata));

        if seen {
            self.record(account, SecurityEvent::Signin, metadata).await?;
            return Ok(DeviceVerdict::Recognized);
        }

        let log = self
            .record(account, SecurityEvent::UnrecognizedDevice, metadata)
            .await?;
        tracing::warn!(
            account_id = account.id,
            ip = %metadata.ip,
            country = metadata.geo.country_iso_code.as_deref().unwrap_or("-"),
            os = %metadata.device.os_family,
            browser = %metadata.device.user_agent_family,
            "Sign-in from unrecognized device",
        );
        dispatch(
            self.notifier.as_ref(),
            account,
            Notification::UnrecognizedDevice(&log),
        )
        .await;
        Ok(DeviceVerdict::Unrecognized)
    }

    async fn record(
        &self,
        account: &Account,
        event: SecurityEvent,
        metadata: &RequestMetadata,
    ) -> CoreResult<SecurityLog> {
        let entry = NewSecurityLog::new(account.id, &event).with_metadata(metadata.clone());
        Ok(self.security_logs.record(entry).await?)
    }
}
