//! Token service: issuance, lookup and deletion by plaintext or id.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument};

use super::factory::TokenFactory;
use super::models::{IssuedToken, NewToken, Token, digest};
use crate::error::{AuthError, AuthResult};
use crate::store::{TokenRepository, UserRepository};
use crate::user::User;

/// Service for token operations.
#[derive(Clone)]
pub struct TokenService {
    tokens: Arc<dyn TokenRepository>,
    users: Arc<dyn UserRepository>,
    factory: TokenFactory,
}

impl TokenService {
    /// Create a new token service.
    pub fn new(
        tokens: Arc<dyn TokenRepository>,
        users: Arc<dyn UserRepository>,
        factory: TokenFactory,
    ) -> Self {
        Self {
            tokens,
            users,
            factory,
        }
    }

    /// The factory used for issuance.
    pub fn factory(&self) -> &TokenFactory {
        &self.factory
    }

    /// Length every issued plaintext has.
    pub fn token_length(&self) -> usize {
        self.factory.length()
    }

    /// Persist `token` for `owner`, replacing any token the owner already has.
    #[instrument(skip(self, token, owner), fields(user_id = owner.id))]
    pub async fn insert(&self, token: &NewToken, owner: &User) -> AuthResult<Token> {
        self.tokens.replace_token(token, owner).await
    }

    /// Generate and persist a token for `owner` valid for `ttl`.
    #[instrument(skip(self, owner), fields(user_id = owner.id))]
    pub async fn issue(&self, owner: &User, ttl: Duration) -> AuthResult<IssuedToken> {
        let (token, plaintext) = self.factory.generate(owner.id, ttl)?;
        let token = self.insert(&token, owner).await?;
        info!(token_id = token.id, expiry = %token.expiry, "issued token");
        Ok(IssuedToken { token, plaintext })
    }

    /// Get a token by id.
    #[instrument(skip(self))]
    pub async fn find(&self, id: i64) -> AuthResult<Token> {
        self.tokens
            .get_token(id)
            .await?
            .ok_or(AuthError::TokenNotFound)
    }

    /// Get the token whose plaintext is `plaintext`.
    #[instrument(skip_all)]
    pub async fn find_by_plaintext(&self, plaintext: &str) -> AuthResult<Token> {
        self.tokens
            .get_token_by_hash(&digest(plaintext))
            .await?
            .ok_or(AuthError::TokenNotFound)
    }

    /// All tokens of a user; empty when there are none.
    #[instrument(skip(self))]
    pub async fn find_by_user(&self, user_id: i64) -> AuthResult<Vec<Token>> {
        self.tokens.tokens_for_user(user_id).await
    }

    /// Most recent unexpired token of a user.
    #[instrument(skip(self))]
    pub async fn latest_live(&self, user_id: i64) -> AuthResult<Option<Token>> {
        self.tokens.latest_live_token(user_id, Utc::now()).await
    }

    /// Delete a token by id. Deleting a missing token succeeds.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> AuthResult<()> {
        self.tokens.delete_token(id).await
    }

    /// Delete a token by plaintext. Deleting an unknown token succeeds.
    #[instrument(skip_all)]
    pub async fn delete_by_plaintext(&self, plaintext: &str) -> AuthResult<()> {
        self.tokens.delete_token_by_hash(&digest(plaintext)).await
    }

    /// Resolve the user owning `token`.
    #[instrument(skip(self, token), fields(token_id = token.id, user_id = token.user_id))]
    pub async fn owner_of(&self, token: &Token) -> AuthResult<User> {
        self.users
            .get_user(token.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Resolve the user owning the token with this plaintext.
    ///
    /// A missing token and a missing owner both report `UserNotFound`.
    #[instrument(skip_all)]
    pub async fn user_for_token(&self, plaintext: &str) -> AuthResult<User> {
        let token = match self.find_by_plaintext(plaintext).await {
            Ok(token) => token,
            Err(AuthError::TokenNotFound) => return Err(AuthError::UserNotFound),
            Err(e) => return Err(e),
        };
        self.owner_of(&token).await
    }

    /// Check that a plaintext names an existing, unexpired token whose owner
    /// still exists.
    #[instrument(skip_all)]
    pub async fn validate(&self, plaintext: &str) -> AuthResult<Token> {
        let token = self.find_by_plaintext(plaintext).await?;
        if token.is_expired() {
            debug!(token_id = token.id, "token expired");
            return Err(AuthError::TokenExpired);
        }
        self.owner_of(&token).await?;
        Ok(token)
    }
}
