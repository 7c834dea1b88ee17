use std::sync::Arc;

use gatekey_core::fingerprint::FingerprintExtractor;
use gatekey_core::geo::{GeoLocator, NetworkTableLocator};
use gatekey_core::hashing::{Argon2Hasher, SecretHasher};
use gatekey_core::key_service::ApiKeyService;
use gatekey_core::memory::MemoryStore;
use gatekey_core::notify::{Notifier, TracingNotifier};
use gatekey_core::origin::OriginVerifier;
use gatekey_core::session::SessionIssuer;
use gatekey_core::store::{
    AccountStore, ApiKeyStore, BillingLogStore, RefreshTokenStore, SecurityLogStore,
};
use gatekey_core::user_agent::{HeuristicUserAgentParser, UserAgentParser};
use gatekey_db::{DbPool, PgStore};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub sessions: SessionIssuer,
    pub api_keys: ApiKeyService,
    pub fingerprints: FingerprintExtractor,
    /// `None` when running on in-memory stores.
    pub pool: Option<DbPool>,
}

/// Replaceable collaborators of the services.
///
/// Passwords and API keys are different secret classes, so each gets its own
/// hasher.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub password_hasher: Arc<dyn SecretHasher>,
    pub key_hasher: Arc<dyn SecretHasher>,
    pub geo: Arc<dyn GeoLocator>,
    pub user_agents: Arc<dyn UserAgentParser>,
}

impl Default for Collaborators {
    /// Log-only notifications, production Argon2 cost, and an empty geo
    /// table (no request can be fingerprinted until one is loaded).
    fn default() -> Self {
        Self {
            notifier: Arc::new(TracingNotifier),
            password_hasher: Arc::new(Argon2Hasher::new()),
            key_hasher: Arc::new(Argon2Hasher::new()),
            geo: Arc::new(NetworkTableLocator::default()),
            user_agents: Arc::new(HeuristicUserAgentParser),
        }
    }
}

impl AppState {
    /// Wire every service to one backing store.
    pub fn from_store<S>(
        config: ServerConfig,
        store: Arc<S>,
        pool: Option<DbPool>,
        deps: Collaborators,
    ) -> Self
    where
        S: AccountStore
            + RefreshTokenStore
            + SecurityLogStore
            + BillingLogStore
            + ApiKeyStore
            + 'static,
    {
        let origin = OriginVerifier::new(store.clone(), deps.notifier.clone());
        let sessions = SessionIssuer::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            deps.notifier.clone(),
            deps.password_hasher,
            origin,
            config.session.clone(),
        );
        let api_keys = ApiKeyService::new(
            store.clone(),
            store,
            deps.notifier,
            deps.key_hasher,
            config.keys.clone(),
        );

        Self {
            config: Arc::new(config),
            sessions,
            api_keys,
            fingerprints: FingerprintExtractor::new(deps.geo, deps.user_agents),
            pool,
        }
    }

    pub fn postgres(config: ServerConfig, pool: DbPool, deps: Collaborators) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        Self::from_store(config, store, Some(pool), deps)
    }

    /// Non-persistent state for local runs and tests.
    pub fn in_memory(config: ServerConfig, deps: Collaborators) -> Self {
        Self::from_store(config, Arc::new(MemoryStore::new()), None, deps)
    }
}
