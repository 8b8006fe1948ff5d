//! Plaintext token generation.

use chrono::{Duration, Utc};
use data_encoding::BASE32_NOPAD;
use rand::TryRngCore;
use rand::rngs::OsRng;

use super::models::{NewToken, digest};
use crate::config::DEFAULT_TOKEN_LENGTH;
use crate::error::{AuthError, AuthResult};

/// Random bytes drawn per token.
pub const TOKEN_ENTROPY_BYTES: usize = 16;

/// Filler appended when the encoded bytes are shorter than the token length.
pub const PAD_CHAR: char = 'A';

/// Generates fixed-length plaintext tokens and their digests.
#[derive(Debug, Clone, Copy)]
pub struct TokenFactory {
    length: usize,
}

impl Default for TokenFactory {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}

impl TokenFactory {
    /// Create a factory producing tokens of exactly `length` characters.
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Length of every generated plaintext.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a token for `user_id` that expires `ttl` from now.
    ///
    /// Returns the unsaved record and the plaintext. `ttl` may be negative,
    /// which yields an already-expired token.
    pub fn generate(&self, user_id: i64, ttl: Duration) -> AuthResult<(NewToken, String)> {
        self.generate_with(&mut OsRng, user_id, ttl)
    }

    /// Same as [`generate`](Self::generate) but drawing from `rng`.
    pub fn generate_with<R: TryRngCore>(
        &self,
        rng: &mut R,
        user_id: i64,
        ttl: Duration,
    ) -> AuthResult<(NewToken, String)> {
        let expiry = Utc::now()
            .checked_add_signed(ttl)
            .ok_or(AuthError::TtlOutOfRange)?;

        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        rng.try_fill_bytes(&mut bytes)
            .map_err(|e| AuthError::RandomSource(e.to_string()))?;

        let plaintext = self.encode(&bytes);
        let token = NewToken {
            user_id,
            token_hash: digest(&plaintext),
            expiry,
        };

        Ok((token, plaintext))
    }

    fn encode(&self, bytes: &[u8]) -> String {
        let mut plaintext = BASE32_NOPAD.encode(bytes);
        if plaintext.len() < self.length {
            let missing = self.length - plaintext.len();
            plaintext.extend(std::iter::repeat_n(PAD_CHAR, missing));
        } else {
            // Base32 output is ASCII, so byte truncation stays on a char boundary.
            plaintext.truncate(self.length);
        }
        plaintext
    }
}
