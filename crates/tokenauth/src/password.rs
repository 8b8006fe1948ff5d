//! Password hashing with bcrypt.

use tracing::warn;

use crate::config::DEFAULT_BCRYPT_COST;
use crate::error::AuthResult;

/// Hashes and verifies user passwords.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher {
    /// Create a hasher using the given bcrypt cost.
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a plaintext password into a salted bcrypt string.
    pub fn hash(&self, plaintext: &str) -> AuthResult<String> {
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// A mismatch is `Ok(false)`. Only a malformed stored hash is an error.
    pub fn verify(&self, hash: &str, plaintext: &str) -> AuthResult<bool> {
        bcrypt::verify(plaintext, hash).map_err(|e| {
            warn!("stored password hash could not be parsed: {}", e);
            e.into()
        })
    }
}
