//! Bearer-token issuance and authentication.
//!
//! Users register with a bcrypt-hashed password, receive an opaque random
//! token with an expiry, and present it on later requests as
//! `Authorization: Bearer <token>`. Only the SHA-256 digest of a token is
//! ever stored. Persistence goes through the [`store`] traits; a SQLite
//! adapter is included.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod password;
pub mod store;
pub mod token;
pub mod user;

pub use auth::{Authenticator, CurrentUser, auth_middleware};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, AuthResult};
pub use password::PasswordHasher;
pub use token::{IssuedToken, Token, TokenFactory, TokenService};
pub use user::{NewUser, User, UserAccount, UserService};

use store::{TokenRepository, UserRepository};

/// The account manager, token service and authenticator wired to one store.
#[derive(Clone)]
pub struct AuthServices {
    pub users: UserService,
    pub tokens: TokenService,
    pub authenticator: Authenticator,
}

impl AuthServices {
    /// Build all services over `store` using the settings in `config`.
    pub fn new<S>(store: Arc<S>, config: &AuthConfig) -> Result<Self, ConfigError>
    where
        S: UserRepository + TokenRepository + 'static,
    {
        config.validate()?;

        let tokens = TokenService::new(
            store.clone(),
            store.clone(),
            TokenFactory::new(config.token_length),
        );
        let users = UserService::new(
            store,
            tokens.clone(),
            PasswordHasher::new(config.bcrypt_cost),
        );
        let authenticator = Authenticator::new(tokens.clone());

        Ok(Self {
            users,
            tokens,
            authenticator,
        })
    }
}
