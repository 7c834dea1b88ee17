//! Append-only audit trails.
//!
//! Three trails exist: the per-account security log, the per-account billing
//! log and the per-key change log.
//! Actions are stored as rendered labels (see the `Display` impls) so export
//! collaborators can read them without knowing these enums.

use std::fmt;

use serde::Serialize;

use crate::fingerprint::RequestMetadata;
use crate::types::{DbId, Timestamp};

/// Account-level security events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    Created,
    Signin,
    UnrecognizedDevice,
    CreateKey { key_id: DbId },
    DeleteKey { key_id: DbId },
    Reset,
    FullName,
    BillingAlertEnabled(bool),
    EmailSubscriptionEnabled(bool),
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Signin => f.write_str("signin"),
            Self::UnrecognizedDevice => f.write_str("unrecognized_device"),
            Self::CreateKey { key_id } => write!(f, "create_key.{key_id}"),
            Self::DeleteKey { key_id } => write!(f, "delete_key.{key_id}"),
            Self::Reset => f.write_str("reset"),
            Self::FullName => f.write_str("fullname"),
            Self::BillingAlertEnabled(v) => write!(f, "billing_alert_enabled.{v}"),
            Self::EmailSubscriptionEnabled(v) => write!(f, "email_subscription_enabled.{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        })
    }
}

/// Per-key change events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyEvent {
    Created,
    Name,
    Scope { path: &'static str, value: bool },
    AccessPolicy { action: PolicyAction, range: String },
    Enabled(bool),
    Deleted,
}

impl fmt::Display for ApiKeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Name => f.write_str("name"),
            Self::Scope { path, value } => write!(f, "scope.{path}.{value}"),
            Self::AccessPolicy { action, range } => write!(f, "access_policy.{action}.{range}"),
            Self::Enabled(v) => write!(f, "enabled.{v}"),
            Self::Deleted => f.write_str("delete_key"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSecurityLog {
    pub account_id: DbId,
    pub action: String,
    pub request_metadata: Option<RequestMetadata>,
    pub created_at: Timestamp,
}

impl NewSecurityLog {
    pub fn new(account_id: DbId, event: &SecurityEvent) -> Self {
        Self {
            account_id,
            action: event.to_string(),
            request_metadata: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: RequestMetadata) -> Self {
        self.request_metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityLog {
    pub id: DbId,
    #[serde(skip_serializing)]
    pub account_id: DbId,
    pub action: String,
    pub request_metadata: Option<RequestMetadata>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyLog {
    pub id: DbId,
    pub api_key_id: DbId,
    pub action: String,
    pub created_at: Timestamp,
}

/// A usage charge. `amount` is the formatted value the billing provider
/// reported.
#[derive(Debug, Clone)]
pub struct NewBillingLog {
    pub account_id: DbId,
    pub action: String,
    pub amount: String,
    pub created_at: Timestamp,
}

impl NewBillingLog {
    pub fn new(account_id: DbId, action: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            account_id,
            action: action.into(),
            amount: amount.into(),
            created_at: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingLog {
    pub id: DbId,
    #[serde(skip_serializing)]
    pub account_id: DbId,
    pub action: String,
    pub amount: String,
    pub created_at: Timestamp,
}
