//! API key domain: generation, scopes, access policies and change diffing.
//!
//! A rendered key is `<prefix>.<payload>`. The prefix is a short, non-secret
//! index used to narrow candidates before the (slow) hash verification; the
//! whole rendered key is what gets hashed.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::audit::{ApiKeyEvent, PolicyAction};
use crate::error::{CoreError, CoreResult};
use crate::patch::Patch;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of the non-secret key prefix (alphanumeric characters).
pub const PREFIX_LENGTH: usize = 7;

/// Length of the secret key payload (alphanumeric characters).
pub const PAYLOAD_LENGTH: usize = 32;

/// Maximum number of non-deleted keys per account unless configured otherwise.
pub const DEFAULT_KEY_LIMIT: i64 = 10;

/// `Authorization` header scheme for API key requests.
pub const AUTH_SCHEME: &str = "ApiKey ";

// ---------------------------------------------------------------------------
// Key generation and parsing
// ---------------------------------------------------------------------------

/// A freshly generated key. The plaintext is shown to the caller once and
/// never stored.
pub struct GeneratedApiKey {
    pub plaintext: String,
    pub prefix: String,
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_api_key() -> GeneratedApiKey {
    let prefix = random_alphanumeric(PREFIX_LENGTH);
    let payload = random_alphanumeric(PAYLOAD_LENGTH);
    GeneratedApiKey {
        plaintext: format!("{prefix}.{payload}"),
        prefix,
    }
}

/// Text before the first `.`; `None` when blank.
pub fn extract_prefix(raw_key: &str) -> Option<&str> {
    raw_key
        .split('.')
        .next()
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
}

/// Raw key from an `Authorization: ApiKey <key>` header value.
pub fn extract_credential(authorization: &str) -> Option<&str> {
    authorization
        .strip_prefix(AUTH_SCHEME)
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextScope {
    pub toxicity: bool,
    pub severe_toxicity: bool,
    pub identity_attack: bool,
    pub insult: bool,
    pub profanity: bool,
    pub threat: bool,
}

/// Content categories a key may classify. Defaults to nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
    pub image: bool,
    pub gif: bool,
    pub text: TextScope,
    pub video: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TextScopePatch {
    pub toxicity: Patch<bool>,
    pub severe_toxicity: Patch<bool>,
    pub identity_attack: Patch<bool>,
    pub insult: Patch<bool>,
    pub profanity: Patch<bool>,
    pub threat: Patch<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScopePatch {
    pub image: Patch<bool>,
    pub gif: Patch<bool>,
    pub text: TextScopePatch,
    pub video: Patch<bool>,
}

/// One scope flag: its audit path, where it lives on a [`Scope`], and where
/// its requested value lives on a [`ScopePatch`].
struct ScopeField {
    path: &'static str,
    slot: fn(&mut Scope) -> &mut bool,
    desired: fn(&ScopePatch) -> &Patch<bool>,
}

/// Scope flags in audit order.
const SCOPE_FIELDS: [ScopeField; 9] = [
    ScopeField {
        path: "image",
        slot: |s| &mut s.image,
        desired: |p| &p.image,
    },
    ScopeField {
        path: "gif",
        slot: |s| &mut s.gif,
        desired: |p| &p.gif,
    },
    ScopeField {
        path: "text.toxicity",
        slot: |s| &mut s.text.toxicity,
        desired: |p| &p.text.toxicity,
    },
    ScopeField {
        path: "text.severe_toxicity",
        slot: |s| &mut s.text.severe_toxicity,
        desired: |p| &p.text.severe_toxicity,
    },
    ScopeField {
        path: "text.identity_attack",
        slot: |s| &mut s.text.identity_attack,
        desired: |p| &p.text.identity_attack,
    },
    ScopeField {
        path: "text.insult",
        slot: |s| &mut s.text.insult,
        desired: |p| &p.text.insult,
    },
    ScopeField {
        path: "text.profanity",
        slot: |s| &mut s.text.profanity,
        desired: |p| &p.text.profanity,
    },
    ScopeField {
        path: "text.threat",
        slot: |s| &mut s.text.threat,
        desired: |p| &p.text.threat,
    },
    ScopeField {
        path: "video",
        slot: |s| &mut s.video,
        desired: |p| &p.video,
    },
];

/// Apply every supplied, differing flag of `patch` to `scope`.
pub fn apply_scope_patch(scope: &mut Scope, patch: &ScopePatch) -> Vec<ApiKeyEvent> {
    let mut events = Vec::new();
    for field in &SCOPE_FIELDS {
        let slot = (field.slot)(scope);
        if let Some(&value) = (field.desired)(patch).changed_from(slot) {
            *slot = value;
            events.push(ApiKeyEvent::Scope {
                path: field.path,
                value,
            });
        }
    }
    events
}

// ---------------------------------------------------------------------------
// Access policies
// ---------------------------------------------------------------------------

/// An IP restriction. `range` is an address or CIDR block and identifies the
/// policy within its key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub name: String,
    pub range: String,
}

impl AccessPolicy {
    pub fn new(name: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: range.into(),
        }
    }

    fn network(&self) -> Option<IpNetwork> {
        self.range.parse().ok()
    }
}

/// Every range must parse and no range may appear twice.
pub fn validate_policies(policies: &[AccessPolicy]) -> CoreResult<()> {
    let mut seen: Vec<IpNetwork> = Vec::with_capacity(policies.len());
    for policy in policies {
        if policy.name.trim().is_empty() {
            return Err(CoreError::Validation(
                "Access policy name must not be empty".into(),
            ));
        }
        let network = policy.network().ok_or_else(|| {
            CoreError::Validation(format!("Invalid access policy range: {}", policy.range))
        })?;
        if seen.contains(&network) {
            return Err(CoreError::Validation(format!(
                "Duplicate access policy range: {}",
                policy.range
            )));
        }
        seen.push(network);
    }
    Ok(())
}

/// Equal as unordered collections of `(name, range)`.
fn same_policies(a: &[AccessPolicy], b: &[AccessPolicy]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

/// Bring `current` in line with `desired`, matching policies by range.
///
/// Every desired policy whose range already exists is `updated` (its name
/// is overwritten, even if unchanged); every new range is `created`; every
/// existing range absent from `desired` is `deleted`. Equal collections
/// produce nothing.
pub fn reconcile_access_policies(
    current: &mut Vec<AccessPolicy>,
    desired: &[AccessPolicy],
) -> Vec<ApiKeyEvent> {
    let mut events = Vec::new();
    if same_policies(current, desired) {
        return events;
    }

    for policy in desired {
        let action = match current.iter_mut().find(|p| p.range == policy.range) {
            Some(existing) => {
                existing.name.clone_from(&policy.name);
                PolicyAction::Updated
            }
            None => {
                current.push(policy.clone());
                PolicyAction::Created
            }
        };
        events.push(ApiKeyEvent::AccessPolicy {
            action,
            range: policy.range.clone(),
        });
    }

    current.retain(|existing| {
        let keep = desired.iter().any(|p| p.range == existing.range);
        if !keep {
            events.push(ApiKeyEvent::AccessPolicy {
                action: PolicyAction::Deleted,
                range: existing.range.clone(),
            });
        }
        keep
    });

    events
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKey {
    pub id: DbId,
    #[serde(skip_serializing)]
    pub account_id: DbId,
    pub name: String,
    pub prefix: String,
    #[serde(skip_serializing)]
    pub hash: String,
    pub enabled: bool,
    pub scope: Scope,
    pub access_policies: Vec<AccessPolicy>,
    pub created_at: Timestamp,
    pub modified_at: Option<Timestamp>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<Timestamp>,
}

impl ApiKey {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True when the key is unrestricted or `ip` falls in one of its ranges.
    pub fn permits(&self, ip: IpAddr) -> bool {
        self.access_policies.is_empty()
            || self
                .access_policies
                .iter()
                .filter_map(AccessPolicy::network)
                .any(|network| network.contains(ip))
    }
}

#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub account_id: DbId,
    pub name: String,
    pub prefix: String,
    pub hash: String,
    pub enabled: bool,
    pub scope: Scope,
    pub access_policies: Vec<AccessPolicy>,
    pub created_at: Timestamp,
}

/// Key creation request. Unset fields take their defaults: disabled, empty
/// scope, unrestricted.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiKey {
    pub name: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub access_policies: Option<Vec<AccessPolicy>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateApiKey {
    pub name: Patch<String>,
    pub scope: Patch<ScopePatch>,
    pub access_policies: Patch<Vec<AccessPolicy>>,
    pub enabled: Patch<bool>,
}

impl UpdateApiKey {
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(name) = self.name.as_set() {
            validate_key_name(name)?;
        }
        if let Some(policies) = self.access_policies.as_set() {
            validate_policies(policies)?;
        }
        Ok(())
    }
}

pub fn validate_key_name(name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("API key name must not be empty".into()));
    }
    Ok(())
}

/// The only time the rendered key leaves the service.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedApiKey {
    #[serde(flatten)]
    pub key: ApiKey,
    #[serde(rename = "key")]
    pub plaintext: String,
}

/// Apply `update` to `key` in audit order: name, scope, access policies,
/// enabled. Returns one event per effective change.
pub fn apply_update(key: &mut ApiKey, update: &UpdateApiKey) -> Vec<ApiKeyEvent> {
    let mut events = Vec::new();

    if let Some(name) = update.name.changed_from(&key.name) {
        key.name.clone_from(name);
        events.push(ApiKeyEvent::Name);
    }

    if let Some(scope) = update.scope.as_set() {
        events.extend(apply_scope_patch(&mut key.scope, scope));
    }

    if let Some(policies) = update.access_policies.as_set() {
        events.extend(reconcile_access_policies(&mut key.access_policies, policies));
    }

    if let Some(&enabled) = update.enabled.changed_from(&key.enabled) {
        key.enabled = enabled;
        events.push(ApiKeyEvent::Enabled(enabled));
    }

    events
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
