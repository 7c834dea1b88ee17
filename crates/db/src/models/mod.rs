//! Row structs.
//!
//! Each submodule contains a `FromRow` struct matching the table and a `From`
//! conversion into the corresponding `gatekey_core` domain type.

pub mod account;
pub mod api_key;
pub mod billing_log;
pub mod refresh_token;
pub mod security_log;
