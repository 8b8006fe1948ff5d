//! User service for account lifecycle operations.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};

use super::models::{NewUser, User, UserAccount};
use crate::error::{AuthError, AuthResult};
use crate::password::PasswordHasher;
use crate::store::UserRepository;
use crate::token::{IssuedToken, TokenService};

/// Service for user management operations.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
    hasher: PasswordHasher,
}

impl UserService {
    /// Create a new user service.
    pub fn new(users: Arc<dyn UserRepository>, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self {
            users,
            tokens,
            hasher,
        }
    }

    /// The token service this account manager issues through.
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create a user and return the new id.
    ///
    /// The password is hashed before anything is written.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create(&self, request: NewUser) -> AuthResult<i64> {
        let mut processed_request = request;
        processed_request.password = self.hasher.hash(&processed_request.password)?;

        let id = i64::try_from(self.users.insert_user(&processed_request).await?)?;
        info!(user_id = id, "created user");

        Ok(id)
    }

    /// Get a user and their most recent unexpired token.
    #[instrument(skip(self))]
    pub async fn fetch(&self, id: i64) -> AuthResult<UserAccount> {
        let user = self
            .users
            .get_user(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.with_token(user).await
    }

    /// Get a user by email and their most recent unexpired token.
    #[instrument(skip(self))]
    pub async fn fetch_by_email(&self, email: &str) -> AuthResult<UserAccount> {
        let user = self
            .users
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.with_token(user).await
    }

    async fn with_token(&self, user: User) -> AuthResult<UserAccount> {
        let token = self.tokens.latest_live(user.id).await?;
        Ok(UserAccount { user, token })
    }

    /// All users ordered by last name.
    #[instrument(skip(self))]
    pub async fn list(&self) -> AuthResult<Vec<User>> {
        self.users.list_users().await
    }

    /// Persist profile changes and return the stored user.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn update(&self, mut user: User) -> AuthResult<User> {
        user.updated_at = Utc::now();
        if !self.users.update_user(&user).await? {
            return Err(AuthError::UserNotFound);
        }
        info!("updated user");
        Ok(user)
    }

    /// Replace a user's password.
    #[instrument(skip(self, password))]
    pub async fn reset_password(&self, id: i64, password: &str) -> AuthResult<()> {
        let mut user = self
            .users
            .get_user(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        user.password_hash = self.hasher.hash(password)?;
        self.update(user).await?;
        info!(user_id = id, "reset password");

        Ok(())
    }

    /// Delete a user. Their tokens go with them.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> AuthResult<()> {
        self.users.delete_user(id).await?;
        info!(user_id = id, "deleted user");
        Ok(())
    }

    /// Check a plaintext password against the user's stored hash.
    #[instrument(skip(self, user, password), fields(user_id = user.id))]
    pub fn password_matches(&self, user: &User, password: &str) -> AuthResult<bool> {
        self.hasher.verify(&user.password_hash, password)
    }

    /// Verify credentials and issue a fresh token valid for `ttl`.
    #[instrument(skip(self, password, ttl))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ttl: Duration,
    ) -> AuthResult<(User, IssuedToken)> {
        let user = match self.users.get_user_by_email(email).await? {
            Some(user) if user.active => user,
            Some(_) => {
                warn!("login attempt for inactive user");
                return Err(AuthError::InvalidCredentials);
            }
            None => return Err(AuthError::InvalidCredentials),
        };

        if !self.password_matches(&user, password)? {
            warn!(user_id = user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.tokens.issue(&user, ttl).await?;
        info!(user_id = user.id, "user logged in");

        Ok((user, issued))
    }
}
