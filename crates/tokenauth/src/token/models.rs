//! Token data models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::FromRow;

/// SHA-256 digest of a plaintext token.
pub type TokenDigest = [u8; 32];

/// Hash a plaintext token the way it is stored.
pub fn digest(plaintext: &str) -> TokenDigest {
    Sha256::digest(plaintext.as_bytes()).into()
}

/// Token row from the database.
///
/// Only the digest of the plaintext is ever stored. The owner's first name
/// and email are copied onto the row at insert time.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Token {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub token_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl Token {
    /// Whether the expiry has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry < now
    }

    /// Whether the expiry has passed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Hex rendering of the stored digest, for logs and admin output.
    pub fn hash_hex(&self) -> String {
        hex::encode(&self.token_hash)
    }
}

/// A freshly generated token that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    pub user_id: i64,
    pub token_hash: TokenDigest,
    pub expiry: DateTime<Utc>,
}

/// A persisted token together with its plaintext.
///
/// This is the only point at which the plaintext exists; hand it to the
/// client and drop it.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: Token,
    pub plaintext: String,
}
