//! Well-known role name constants.
//!
//! Roles are stored as plain strings on the account row and embedded in
//! bearer-token claims.

pub const ROLE_ADMIN: &str = "admin";
