//! HTTP-level tests for the two authentication schemes.

mod common;

use axum::http::StatusCode;
use gatekey_core::api_keys::AccessPolicy;

use common::{
    body_json, get, get_from, get_with_headers, FIREFOX, LONDON_IP, PROXY_PEER, USERNAME,
};

// ---------------------------------------------------------------------------
// Bearer (account) authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn me_requires_authorization_header() {
    let app = common::build_test_app(common::test_state());
    let response = get(app, "/api/v1/me").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn me_rejects_other_schemes_and_bad_tokens() {
    let state = common::test_state();
    let token = common::access_token(&state).await;

    let basic = format!("Basic {token}");
    let response = get_with_headers(
        common::build_test_app(state.clone()),
        "/api/v1/me",
        &[("authorization", basic.as_str())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_with_headers(
        common::build_test_app(state),
        "/api/v1/me",
        &[("authorization", "Bearer not.a.jwt")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_account_and_request_fingerprint() {
    let state = common::test_state();
    let bearer = format!("Bearer {}", common::access_token(&state).await);

    let response = get_with_headers(
        common::build_test_app(state),
        "/api/v1/me",
        &[
            ("authorization", bearer.as_str()),
            ("x-forwarded-for", "81.2.69.10, 10.0.0.1"),
            ("user-agent", FIREFOX),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    let account = &json["data"]["account"];
    assert_eq!(account["username"], USERNAME);
    assert_eq!(account["roles"][0], "admin");
    assert!(account.get("password_hash").is_none(), "hash must never be serialized");

    let metadata = &json["data"]["request_metadata"];
    assert_eq!(metadata["ip"], LONDON_IP);
    assert_eq!(metadata["geo"]["city_name"], "London");
    assert_eq!(metadata["device"]["user_agent_family"], "Firefox");
    assert_eq!(metadata["device"]["os_family"], "Mac OS X");
}

#[tokio::test]
async fn me_without_client_address_has_no_fingerprint() {
    let state = common::test_state();
    let bearer = format!("Bearer {}", common::access_token(&state).await);

    let response = get_with_headers(
        common::build_test_app(state),
        "/api/v1/me",
        &[("authorization", bearer.as_str())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["request_metadata"].is_null());
}

// ---------------------------------------------------------------------------
// ApiKey authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enabled_key_authenticates() {
    let state = common::test_state();
    common::access_token(&state).await;
    let created = common::create_key(&state, true, Vec::new()).await;

    let credential = format!("ApiKey {}", created.plaintext);
    let response = get_with_headers(
        common::build_test_app(state),
        "/api/v1/keys/current",
        &[("authorization", credential.as_str())],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], created.key.id);
    assert_eq!(json["data"]["prefix"], created.key.prefix.as_str());
    assert!(json["data"].get("hash").is_none());
    assert!(json["data"].get("key").is_none());
}

#[tokio::test]
async fn unknown_or_tampered_key_is_unauthorized() {
    let state = common::test_state();
    common::access_token(&state).await;
    let created = common::create_key(&state, true, Vec::new()).await;

    let mut tampered = created.plaintext.clone();
    let last = if tampered.ends_with('a') { 'b' } else { 'a' };
    tampered.pop();
    tampered.push(last);

    for raw in [tampered.as_str(), "nope123.payload", ".payload"] {
        let credential = format!("ApiKey {raw}");
        let response = get_with_headers(
            common::build_test_app(state.clone()),
            "/api/v1/keys/current",
            &[("authorization", credential.as_str())],
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "key {raw}");
    }
}

#[tokio::test]
async fn bearer_token_is_not_an_api_key() {
    let state = common::test_state();
    let bearer = format!("Bearer {}", common::access_token(&state).await);

    let response = get_with_headers(
        common::build_test_app(state),
        "/api/v1/keys/current",
        &[("authorization", bearer.as_str())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn disabled_key_is_forbidden() {
    let state = common::test_state();
    common::access_token(&state).await;
    let created = common::create_key(&state, false, Vec::new()).await;

    let credential = format!("ApiKey {}", created.plaintext);
    let response = get_with_headers(
        common::build_test_app(state),
        "/api/v1/keys/current",
        &[("authorization", credential.as_str())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleted_key_is_unauthorized() {
    let state = common::test_state();
    common::access_token(&state).await;
    let created = common::create_key(&state, true, Vec::new()).await;
    state.api_keys.delete(USERNAME, created.key.id).await.unwrap();

    let credential = format!("ApiKey {}", created.plaintext);
    let response = get_with_headers(
        common::build_test_app(state),
        "/api/v1/keys/current",
        &[("authorization", credential.as_str())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn access_policies_restrict_client_addresses() {
    let state = common::test_state();
    common::access_token(&state).await;
    let created = common::create_key(
        &state,
        true,
        vec![AccessPolicy::new("office", "10.0.0.0/8")],
    )
    .await;
    let credential = format!("ApiKey {}", created.plaintext);

    let cases: [(Option<&str>, Option<&str>, StatusCode); 6] = [
        (Some("10.1.2.3:40000"), None, StatusCode::OK),
        (Some("198.51.100.7:40000"), None, StatusCode::FORBIDDEN),
        // A direct client cannot vouch for itself.
        (Some("198.51.100.7:40000"), Some("10.1.2.3"), StatusCode::FORBIDDEN),
        // Without a socket peer there is nothing to trust the header on.
        (None, Some("10.1.2.3"), StatusCode::FORBIDDEN),
        // Behind a trusted proxy the right-most untrusted hop is the client.
        (Some(PROXY_PEER), Some("10.1.2.3"), StatusCode::OK),
        (Some(PROXY_PEER), Some("10.1.2.3, 198.51.100.7"), StatusCode::FORBIDDEN),
    ];

    for (peer, forwarded_for, expected) in cases {
        let mut headers = vec![("authorization", credential.as_str())];
        if let Some(ip) = forwarded_for {
            headers.push(("x-forwarded-for", ip));
        }
        let app = common::build_test_app(state.clone());
        let response = match peer {
            Some(peer) => get_from(app, "/api/v1/keys/current", peer, &headers).await,
            None => get_with_headers(app, "/api/v1/keys/current", &headers).await,
        };
        assert_eq!(
            response.status(),
            expected,
            "peer {peer:?} forwarded {forwarded_for:?}"
        );
    }
}

#[tokio::test]
async fn forged_forwarded_for_cannot_bypass_policy() {
    let state = common::test_state();
    common::access_token(&state).await;
    let created = common::create_key(
        &state,
        true,
        vec![AccessPolicy::new("office", "10.0.0.0/8")],
    )
    .await;
    let credential = format!("ApiKey {}", created.plaintext);

    let response = get_from(
        common::build_test_app(state),
        "/api/v1/keys/current",
        "198.51.100.7:40000",
        &[
            ("authorization", credential.as_str()),
            ("x-forwarded-for", "10.1.2.3"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn unrestricted_key_works_without_client_address() {
    let state = common::test_state();
    common::access_token(&state).await;
    let created = common::create_key(&state, true, Vec::new()).await;
    let credential = format!("ApiKey {}", created.plaintext);

    let response = get_with_headers(
        common::build_test_app(state),
        "/api/v1/keys/current",
        &[("authorization", credential.as_str())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
