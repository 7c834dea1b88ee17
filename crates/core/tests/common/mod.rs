#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use argon2::Params;
use async_trait::async_trait;

use gatekey_core::account::Account;
use gatekey_core::fingerprint::{DeviceMetadata, GeoMetadata, RequestMetadata};
use gatekey_core::hashing::Argon2Hasher;
use gatekey_core::jwt::JwtConfig;
use gatekey_core::key_service::{ApiKeyService, KeyConfig};
use gatekey_core::memory::MemoryStore;
use gatekey_core::notify::{Notification, Notifier, NotifyError};
use gatekey_core::origin::OriginVerifier;
use gatekey_core::session::{SessionConfig, SessionIssuer};

pub const USERNAME: &str = "ada@example.com";
pub const PASSWORD: &str = "correct-horse-battery";

/// Records `(username, kind)` for every notification sent.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, &'static str)>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(|(_, k)| *k).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        account: &Account,
        notification: Notification<'_>,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((account.username.clone(), notification.kind()));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub sessions: SessionIssuer,
    pub keys: ApiKeyService,
    pub jwt: JwtConfig,
}

/// Argon2 with minimal cost so tests stay fast.
pub fn cheap_hasher() -> Arc<Argon2Hasher> {
    Arc::new(Argon2Hasher::with_params(Params::new(8, 1, 1, None).unwrap()))
}

pub fn harness() -> Harness {
    harness_with_key_limit(3)
}

pub fn harness_with_key_limit(key_limit: i64) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let jwt = JwtConfig {
        secret: "integration-test-secret".to_string(),
        access_token_expiry_mins: 15,
    };

    let origin = OriginVerifier::new(store.clone(), notifier.clone());
    let sessions = SessionIssuer::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        cheap_hasher(),
        origin,
        SessionConfig::with_jwt(jwt.clone()),
    );
    let keys = ApiKeyService::new(
        store.clone(),
        store.clone(),
        notifier.clone(),
        cheap_hasher(),
        KeyConfig { key_limit },
    );

    Harness {
        store,
        notifier,
        sessions,
        keys,
        jwt,
    }
}

impl Harness {
    pub async fn signup(&self) {
        self.sessions.signup(USERNAME, PASSWORD).await.unwrap();
    }
}

pub fn fingerprint(ip: &str, city: &str, browser_major: &str) -> RequestMetadata {
    RequestMetadata {
        ip: ip.to_string(),
        geo: GeoMetadata {
            country_iso_code: Some("GB".into()),
            subdivision_iso_code: Some("ENG".into()),
            city_name: Some(city.to_string()),
        },
        device: DeviceMetadata {
            os_family: "Mac OS X".into(),
            os_major: Some("10".into()),
            os_minor: Some("15".into()),
            user_agent_family: "Firefox".into(),
            user_agent_major: Some(browser_major.to_string()),
            user_agent_minor: Some("0".into()),
        },
    }
}
