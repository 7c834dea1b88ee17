//! Credential core of the gatekey account platform.
//!
//! Storage-agnostic: services talk to the traits in [`store`], implemented
//! in memory by [`memory::MemoryStore`] and on PostgreSQL by `gatekey-db`.

pub mod account;
pub mod api_keys;
pub mod audit;
pub mod error;
pub mod fingerprint;
pub mod geo;
pub mod hashing;
pub mod jwt;
pub mod key_service;
pub mod memory;
pub mod notify;
pub mod origin;
pub mod patch;
pub mod roles;
pub mod session;
pub mod store;
pub mod types;
pub mod user_agent;
