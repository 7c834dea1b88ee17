//! One-way secret hashing for passwords and API keys.
//!
//! All digests use the Argon2id variant with a cryptographically random salt
//! generated via [`OsRng`]. The PHC string format is used for storage so that
//! algorithm parameters and salt are embedded in the digest itself. Because
//! the salt varies, digests are never compared for equality; callers always go
//! through [`SecretHasher::verify`].

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::{CoreError, CoreResult};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Salted, adaptive, one-way hashing of a secret class (passwords, API keys).
pub trait SecretHasher: Send + Sync {
    /// Hash `secret`, returning a self-describing digest.
    fn hash(&self, secret: &str) -> CoreResult<String>;

    /// Check `secret` against a digest previously produced by [`hash`](Self::hash).
    ///
    /// Returns `Ok(false)` on mismatch. A malformed digest is an internal error.
    fn verify(&self, secret: &str, digest: &str) -> CoreResult<bool>;
}

/// Argon2id implementation of [`SecretHasher`].
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Hasher with the Argon2 crate's default cost parameters.
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    /// Hasher with explicit cost parameters.
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> CoreResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| CoreError::Internal(format!("Secret hashing error: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify(&self, secret: &str, digest: &str) -> CoreResult<bool> {
        let parsed = PasswordHash::new(digest)
            .map_err(|e| CoreError::Internal(format!("Malformed secret digest: {e}")))?;
        match self.argon2().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CoreError::Internal(format!(
                "Secret verification error: {e}"
            ))),
        }
    }
}

/// Validate that a password meets minimum strength requirements.
///
/// Currently enforces a minimum character length.
pub fn validate_password_strength(password: &str, min_length: usize) -> CoreResult<()> {
    if password.chars().count() < min_length {
        return Err(CoreError::Validation(format!(
            "Password must be at least {min_length} characters long"
        )));
    }
    Ok(())
}
