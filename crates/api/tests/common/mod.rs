#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use argon2::Params;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use gatekey_api::config::ServerConfig;
use gatekey_api::router::build_app_router;
use gatekey_api::state::{AppState, Collaborators};
use gatekey_core::api_keys::{AccessPolicy, CreateApiKey, CreatedApiKey};
use gatekey_core::fingerprint::GeoMetadata;
use gatekey_core::geo::NetworkTableLocator;
use gatekey_core::hashing::Argon2Hasher;
use gatekey_core::jwt::JwtConfig;
use gatekey_core::key_service::KeyConfig;
use gatekey_core::session::SessionConfig;

pub const USERNAME: &str = "ada@example.com";
pub const PASSWORD: &str = "correct-horse-battery";

/// Address inside the test geo table.
pub const LONDON_IP: &str = "81.2.69.10";

/// Reverse proxy range the test server trusts for `X-Forwarded-For`.
pub const PROXY_PEER: &str = "172.31.0.5:443";

pub const FIREFOX: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        geo_table_path: None,
        trusted_proxies: vec!["172.31.0.0/16".parse().unwrap()],
        session: SessionConfig::with_jwt(JwtConfig {
            secret: "api-test-secret".to_string(),
            access_token_expiry_mins: 15,
        }),
        keys: KeyConfig { key_limit: 3 },
    }
}

/// Argon2 with minimal cost so tests stay fast.
fn cheap_hasher() -> Arc<Argon2Hasher> {
    Arc::new(Argon2Hasher::with_params(Params::new(8, 1, 1, None).unwrap()))
}

/// In-memory state with a one-network geo table.
pub fn test_state() -> AppState {
    let geo = NetworkTableLocator::from_entries([(
        "81.2.69.0/24".parse().unwrap(),
        GeoMetadata {
            country_iso_code: Some("GB".into()),
            subdivision_iso_code: Some("ENG".into()),
            city_name: Some("London".into()),
        },
    )]);

    let deps = Collaborators {
        password_hasher: cheap_hasher(),
        key_hasher: cheap_hasher(),
        geo: Arc::new(geo),
        ..Collaborators::default()
    };
    AppState::in_memory(test_config(), deps)
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state)
}

/// Sign up the test account and return a Bearer access token.
pub async fn access_token(state: &AppState) -> String {
    state
        .sessions
        .signup(USERNAME, PASSWORD)
        .await
        .expect("signup should succeed")
        .access_token
}

/// Create a key for the (already signed up) test account.
pub async fn create_key(
    state: &AppState,
    enabled: bool,
    access_policies: Vec<AccessPolicy>,
) -> CreatedApiKey {
    state
        .api_keys
        .create(
            USERNAME,
            CreateApiKey {
                name: "integration".to_string(),
                enabled: Some(enabled),
                scope: None,
                access_policies: Some(access_policies),
            },
        )
        .await
        .expect("key creation should succeed")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    get_with_headers(app, uri, &[]).await
}

pub async fn get_with_headers(
    app: Router,
    uri: &str,
    headers: &[(&str, &str)],
) -> Response<Body> {
    send(app, uri, None, headers).await
}

/// GET as if the TCP connection came from `peer`.
pub async fn get_from(
    app: Router,
    uri: &str,
    peer: &str,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let peer: SocketAddr = peer.parse().unwrap();
    send(app, uri, Some(peer), headers).await
}

async fn send(
    app: Router,
    uri: &str,
    peer: Option<SocketAddr>,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    if let Some(peer) = peer {
        builder = builder.extension(ConnectInfo(peer));
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
