//! Error types shared by every component.

use thiserror::Error;

/// Result type for authentication and persistence operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors surfaced by the hasher, token factory, stores and authenticator.
///
/// Nothing here is retried internally. Callers branch on the variant, so each
/// failure reason keeps its own variant rather than collapsing into a generic
/// "unauthorized".
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or empty authorization header.
    #[error("no authorization header received")]
    MissingAuthHeader,

    /// Header is not of the form `Bearer <token>`.
    #[error("invalid authorization header format")]
    MalformedHeader,

    /// Presented token does not have the configured length.
    #[error("invalid token length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// No stored token matches the presented plaintext.
    #[error("no matching token found")]
    TokenNotFound,

    /// Token exists but its expiry has passed.
    #[error("token has expired")]
    TokenExpired,

    /// No user matches the id, email or token owner.
    #[error("no matching user found")]
    UserNotFound,

    /// Another user already holds this email.
    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    /// Email/password pair rejected at login.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Password hashing failed, or a stored hash is corrupt.
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    /// The entropy source could not produce random bytes.
    #[error("random source failure: {0}")]
    RandomSource(String),

    /// `now + ttl` does not fit in a timestamp.
    #[error("token ttl out of range")]
    TtlOutOfRange,

    /// The persistence adapter returned an id the domain cannot use.
    #[error("unsupported record id: {0}")]
    UnsupportedRecordId(String),

    /// Opaque pass-through from the database.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl AuthError {
    /// Stable machine-readable code for this error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::MalformedHeader => "malformed_auth_header",
            AuthError::InvalidLength { .. } => "invalid_token_length",
            AuthError::TokenNotFound => "token_not_found",
            AuthError::TokenExpired => "token_expired",
            AuthError::UserNotFound => "user_not_found",
            AuthError::DuplicateEmail(_) => "duplicate_email",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Hashing(_) => "hashing_error",
            AuthError::RandomSource(_) => "random_source_error",
            AuthError::TtlOutOfRange => "ttl_out_of_range",
            AuthError::UnsupportedRecordId(_) => "unsupported_record_id",
            AuthError::Persistence(_) => "persistence_error",
            AuthError::Migration(_) => "migration_error",
        }
    }

    /// Whether the error was caused by what the client presented, as opposed
    /// to a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AuthError::MissingAuthHeader
                | AuthError::MalformedHeader
                | AuthError::InvalidLength { .. }
                | AuthError::TokenNotFound
                | AuthError::TokenExpired
                | AuthError::UserNotFound
                | AuthError::DuplicateEmail(_)
                | AuthError::InvalidCredentials
                | AuthError::TtlOutOfRange
        )
    }
}
