//! Persistence port for users and tokens.
//!
//! Services receive an implementation of these traits at construction; the
//! SQLite adapter lives in [`sqlite`].

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AuthError, AuthResult};
use crate::token::{NewToken, Token, TokenDigest};
use crate::user::{NewUser, User};

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Identifier assigned by a persistence adapter to an inserted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordId {
    /// Integer primary key (rowid, serial).
    Int(i64),
    /// Textual key such as a UUID.
    Str(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{id}"),
            RecordId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl TryFrom<RecordId> for i64 {
    type Error = AuthError;

    fn try_from(id: RecordId) -> Result<Self, Self::Error> {
        match id {
            RecordId::Int(id) => Ok(id),
            RecordId::Str(s) => s.parse().map_err(|_| AuthError::UnsupportedRecordId(s)),
        }
    }
}

/// User persistence operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user whose `password` already holds a hash. Stamps both
    /// timestamps. Fails with `DuplicateEmail` on an email collision.
    async fn insert_user(&self, user: &NewUser) -> AuthResult<RecordId>;

    /// Get a user by id.
    async fn get_user(&self, id: i64) -> AuthResult<Option<User>>;

    /// Get a user by email.
    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// All users ordered by last name.
    async fn list_users(&self) -> AuthResult<Vec<User>>;

    /// Overwrite the stored fields of `user`, keyed by its id.
    /// Returns `false` when no row has that id.
    async fn update_user(&self, user: &User) -> AuthResult<bool>;

    /// Delete a user. Owned tokens go with it. Missing ids are not an error.
    async fn delete_user(&self, id: i64) -> AuthResult<()>;
}

/// Token persistence operations.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Atomically delete every token owned by `owner` and insert `token`,
    /// copying the owner's first name and email onto the row.
    async fn replace_token(&self, token: &NewToken, owner: &User) -> AuthResult<Token>;

    /// Get a token by id.
    async fn get_token(&self, id: i64) -> AuthResult<Option<Token>>;

    /// Get a token by the digest of its plaintext.
    async fn get_token_by_hash(&self, hash: &TokenDigest) -> AuthResult<Option<Token>>;

    /// All tokens owned by a user.
    async fn tokens_for_user(&self, user_id: i64) -> AuthResult<Vec<Token>>;

    /// Most recently created token of a user that has not expired at `now`.
    async fn latest_live_token(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Token>>;

    /// Delete a token by id. Missing ids are not an error.
    async fn delete_token(&self, id: i64) -> AuthResult<()>;

    /// Delete a token by digest. Unknown digests are not an error.
    async fn delete_token_by_hash(&self, hash: &TokenDigest) -> AuthResult<()>;
}
