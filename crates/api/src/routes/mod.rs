pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /me                     account behind the Bearer token (requires JWT)
/// /keys/current           key behind the ApiKey credential (requires API key)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::me::current_account))
        .route("/keys/current", get(handlers::api_keys::current_key))
}
