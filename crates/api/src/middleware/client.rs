//! Extractors describing who is on the other end of the connection.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use gatekey_core::fingerprint::{RequestContext, RequestMetadata};

use crate::state::AppState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Raw client address and headers. Never rejects.
///
/// The socket address is only present when the server is started with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Debug, Clone)]
pub struct ClientContext(pub RequestContext);

impl<S: Send + Sync> FromRequestParts<S> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());

        Ok(ClientContext(RequestContext {
            remote_addr,
            forwarded_for: header_value(&parts.headers, X_FORWARDED_FOR),
            user_agent: header_value(&parts.headers, USER_AGENT.as_str()),
        }))
    }
}

/// The request's fingerprint, or `None` when it cannot be derived.
#[derive(Debug, Clone)]
pub struct ClientFingerprint(pub Option<RequestMetadata>);

impl FromRequestParts<AppState> for ClientFingerprint {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ClientContext(context) = ClientContext::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        Ok(ClientFingerprint(state.fingerprints.extract(&context)))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
