//! gatekey HTTP server library.
//!
//! Exposes configuration, state wiring, error mapping, extractors and routes
//! so integration tests and the binary entrypoint share them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
