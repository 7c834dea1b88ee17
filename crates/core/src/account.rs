//! Accounts, devices (refresh tokens) and the token pair handed to clients.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::RequestMetadata;
use crate::patch::Patch;
use crate::types::{DbId, Timestamp};

/// Lifetime of a password reset token, in hours.
pub const PASSWORD_RESET_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: DbId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub email_subscription_enabled: bool,
    pub billing_alert_enabled: bool,
    pub roles: Vec<String>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<Uuid>,
    #[serde(skip_serializing)]
    pub password_reset_token_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Account {
    pub fn set_password_reset_token(&mut self, token: Uuid, expires_at: Timestamp) {
        self.password_reset_token = Some(token);
        self.password_reset_token_expires_at = Some(expires_at);
    }

    pub fn clear_password_reset_token(&mut self) {
        self.password_reset_token = None;
        self.password_reset_token_expires_at = None;
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub created_at: Timestamp,
}

/// Partial update of an account's profile settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountPatch {
    pub full_name: Patch<Option<String>>,
    pub email_subscription_enabled: Patch<bool>,
    pub billing_alert_enabled: Patch<bool>,
}

/// A signed-in device. The token is the opaque refresh credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken {
    pub token: Uuid,
    #[serde(skip_serializing)]
    pub account_id: DbId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub request_metadata: Option<RequestMetadata>,
}

impl RefreshToken {
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    /// Absent on signup; present on signin and refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Uuid>,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// The identity behind a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub username: String,
    pub roles: Vec<String>,
}
