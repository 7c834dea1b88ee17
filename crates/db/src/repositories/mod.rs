//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Writes that must commit with an
//! audit entry open their own transaction.

pub mod account_repo;
pub mod api_key_repo;
pub mod billing_log_repo;
pub mod refresh_token_repo;
pub mod security_log_repo;

pub use account_repo::AccountRepo;
pub use api_key_repo::ApiKeyRepo;
pub use billing_log_repo::BillingLogRepo;
pub use refresh_token_repo::RefreshTokenRepo;
pub use security_log_repo::SecurityLogRepo;
