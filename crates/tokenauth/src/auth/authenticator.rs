//! Bearer-token authentication of inbound requests.

use tracing::{debug, instrument};

use super::header::{AUTHORIZATION, HeaderSource, bearer_token, header_text};
use crate::error::{AuthError, AuthResult};
use crate::token::TokenService;
use crate::user::User;

/// Resolves the user behind a request's bearer token.
///
/// Checks run in a fixed order and stop at the first failure: header
/// presence, `Bearer` format, token length, token lookup, expiry, owner
/// lookup. Nothing touches the store until the header is well-formed.
#[derive(Clone)]
pub struct Authenticator {
    tokens: TokenService,
}

impl Authenticator {
    /// Create an authenticator over the given token service.
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }

    /// Length a presented token must have.
    pub fn token_length(&self) -> usize {
        self.tokens.token_length()
    }

    /// Authenticate a request by its `Authorization` header.
    pub async fn authenticate<H>(&self, request: &H) -> AuthResult<User>
    where
        H: HeaderSource + ?Sized,
    {
        let header = header_text(request.header_bytes(AUTHORIZATION))?;
        self.authenticate_header(header).await
    }

    /// Authenticate a raw `Authorization` header value.
    #[instrument(skip_all)]
    pub async fn authenticate_header(&self, header: Option<&str>) -> AuthResult<User> {
        let plaintext = bearer_token(header, self.token_length())?;

        let token = self.tokens.find_by_plaintext(plaintext).await?;
        if token.is_expired() {
            debug!(token_id = token.id, expiry = %token.expiry, "rejected expired token");
            return Err(AuthError::TokenExpired);
        }

        let user = self.tokens.owner_of(&token).await?;
        debug!(user_id = user.id, "authenticated request");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::db::Database;
    use crate::store::{SqliteStore, UserRepository};
    use crate::token::TokenFactory;
    use crate::user::NewUser;

    async fn setup() -> (Authenticator, TokenService, User) {
        let (auth, tokens, user, _) = setup_with_store().await;
        (auth, tokens, user)
    }

    async fn setup_with_store() -> (Authenticator, TokenService, User, Arc<SqliteStore>) {
        let db = Database::in_memory().await.unwrap();
        let store = Arc::new(SqliteStore::from_database(&db));
        let id = store
            .insert_user(&NewUser {
                first_name: "Some".to_string(),
                last_name: "Guy".to_string(),
                email: "test@test.com".to_string(),
                active: true,
                password: "$2b$04$placeholder".to_string(),
            })
            .await
            .unwrap();
        let user = store
            .get_user(i64::try_from(id).unwrap())
            .await
            .unwrap()
            .unwrap();

        let tokens = TokenService::new(store.clone(), store.clone(), TokenFactory::default());
        (Authenticator::new(tokens.clone()), tokens, user, store)
    }

    fn request_with(header: &str) -> HashMap<String, String> {
        HashMap::from([("Authorization".to_string(), header.to_string())])
    }

    #[tokio::test]
    async fn test_authenticate_valid_token() {
        let (auth, tokens, user) = setup().await;
        let issued = tokens.issue(&user, Duration::hours(1)).await.unwrap();

        let req = request_with(&format!("Bearer {}", issued.plaintext));
        let authed = auth.authenticate(&req).await.unwrap();
        assert_eq!(authed.id, user.id);
        assert_eq!(authed.email, "test@test.com");
    }

    #[tokio::test]
    async fn test_authenticate_unknown_token() {
        let (auth, _, _) = setup().await;
        let req = request_with("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert!(matches!(
            auth.authenticate(&req).await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_expired_token() {
        let (auth, tokens, user) = setup().await;
        let issued = tokens.issue(&user, Duration::hours(-1)).await.unwrap();

        let req = request_with(&format!("Bearer {}", issued.plaintext));
        assert!(matches!(
            auth.authenticate(&req).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_header_failures() {
        let (auth, _, _) = setup().await;

        assert!(matches!(
            auth.authenticate(&HashMap::<String, String>::new()).await,
            Err(AuthError::MissingAuthHeader)
        ));
        assert!(matches!(
            auth.authenticate_header(Some("")).await,
            Err(AuthError::MissingAuthHeader)
        ));
        assert!(matches!(
            auth.authenticate_header(Some("ABCDEFGHIJKLMNOPQRSTUVWXYZ")).await,
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            auth.authenticate_header(Some("Bearer short")).await,
            Err(AuthError::InvalidLength { .. })
        ));
    }

    #[tokio::test]
    async fn test_authenticate_token_without_owner() {
        let (auth, tokens, user, store) = setup_with_store().await;
        let issued = tokens.issue(&user, Duration::hours(1)).await.unwrap();

        // Remove the owner while leaving the token row behind.
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(store.pool())
            .await
            .unwrap();

        let header = format!("Bearer {}", issued.plaintext);
        assert!(matches!(
            auth.authenticate_header(Some(&header)).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_non_utf8_header() {
        let (auth, _, _) = setup().await;
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "authorization",
            axum::http::HeaderValue::from_bytes(b"Bearer \xffABCDEFGHIJKLMNOPQRSTUVWXY").unwrap(),
        );

        assert!(matches!(
            auth.authenticate(&headers).await,
            Err(AuthError::MalformedHeader)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_revoked_token() {
        let (auth, tokens, user) = setup().await;
        let issued = tokens.issue(&user, Duration::hours(1)).await.unwrap();
        tokens.delete_by_plaintext(&issued.plaintext).await.unwrap();

        let header = format!("Bearer {}", issued.plaintext);
        assert!(matches!(
            auth.authenticate_header(Some(&header)).await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_custom_token_length() {
        let db = Database::in_memory().await.unwrap();
        let store = Arc::new(SqliteStore::from_database(&db));
        let tokens = TokenService::new(store.clone(), store, TokenFactory::new(40));
        let auth = Authenticator::new(tokens);

        assert_eq!(auth.token_length(), 40);
        assert!(matches!(
            auth.authenticate_header(Some("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ")).await,
            Err(AuthError::InvalidLength {
                expected: 40,
                actual: 26
            })
        ));
    }
}
