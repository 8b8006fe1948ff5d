//! Axum integration: authentication middleware, extractor and error responses.

use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

use super::authenticator::Authenticator;
use crate::error::AuthError;
use crate::user::User;

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Get the user ID.
    pub fn id(&self) -> i64 {
        self.0.id
    }

    /// Get the user's email.
    pub fn email(&self) -> &str {
        &self.0.email
    }
}

/// Extract authentication from request.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// Authentication middleware.
///
/// Authenticates the `Authorization: Bearer <token>` header and injects
/// `CurrentUser` into request extensions.
pub async fn auth_middleware(
    State(auth): State<Authenticator>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let user = auth
        .authenticate(req.headers())
        .await
        .map_err(rejection)?;

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

/// Every client-side authentication failure is a 401, including a token
/// whose owner no longer exists. Server failures keep their own status.
fn rejection(err: AuthError) -> Response {
    if !err.is_client_error() {
        return err.into_response();
    }
    (StatusCode::UNAUTHORIZED, error_body(&err)).into_response()
}

fn error_body(err: &AuthError) -> Json<AuthErrorResponse> {
    Json(AuthErrorResponse {
        error: err.to_string(),
        error_code: err.error_code().to_string(),
    })
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl AuthError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::MalformedHeader
            | AuthError::InvalidLength { .. }
            | AuthError::TokenNotFound
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::DuplicateEmail(_) => StatusCode::CONFLICT,
            AuthError::TtlOutOfRange => StatusCode::BAD_REQUEST,
            AuthError::Hashing(_)
            | AuthError::RandomSource(_)
            | AuthError::UnsupportedRecordId(_)
            | AuthError::Persistence(_)
            | AuthError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "authentication failed with server error");
        }

        (status, error_body(&self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Router, middleware, routing::get};
    use chrono::Duration;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::db::Database;
    use crate::store::{SqliteStore, UserRepository};
    use crate::token::{TokenFactory, TokenService};
    use crate::user::NewUser;

    async fn whoami(user: CurrentUser) -> String {
        user.email().to_string()
    }

    async fn test_app() -> (Router, TokenService, User) {
        let (app, tokens, user, _) = test_app_with_store().await;
        (app, tokens, user)
    }

    async fn test_app_with_store() -> (Router, TokenService, User, Arc<SqliteStore>) {
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
        let auth = Authenticator::new(tokens.clone());

        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(auth, auth_middleware));

        (app, tokens, user, store)
    }

    fn request(header: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let (app, tokens, user) = test_app().await;
        let issued = tokens.issue(&user, Duration::hours(1)).await.unwrap();

        let response = app
            .oneshot(request(Some(&format!("Bearer {}", issued.plaintext))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert_eq!(&body[..], b"test@test.com");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let (app, _, _) = test_app().await;

        let response = app.oneshot(request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let (app, tokens, user) = test_app().await;
        let issued = tokens.issue(&user, Duration::hours(-1)).await.unwrap();

        let response = app
            .oneshot(request(Some(&format!("Bearer {}", issued.plaintext))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["error_code"], "token_expired");
    }

    #[tokio::test]
    async fn test_malformed_header_codes() {
        let (app, _, _) = test_app().await;

        let response = app
            .clone()
            .oneshot(request(Some("Basic dXNlcjpwYXNz")))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["error_code"], "malformed_auth_header");

        let response = app.oneshot(request(Some("Bearer short"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "invalid_token_length");
    }

    #[tokio::test]
    async fn test_token_without_owner_is_unauthorized() {
        let (app, tokens, user, store) = test_app_with_store().await;
        let issued = tokens.issue(&user, Duration::hours(1)).await.unwrap();

        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(store.pool())
            .await
            .unwrap();

        let response = app
            .oneshot(request(Some(&format!("Bearer {}", issued.plaintext))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "user_not_found");
    }

    #[tokio::test]
    async fn test_non_utf8_header_is_malformed() {
        let (app, _, _) = test_app().await;
        let req = Request::builder()
            .uri("/whoami")
            .header(
                "Authorization",
                axum::http::HeaderValue::from_bytes(b"Bearer \xffABCDEFGHIJKLMNOPQRSTUVWXY")
                    .unwrap(),
            )
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "malformed_auth_header");
    }

    #[tokio::test]
    async fn test_extractor_without_middleware() {
        let app = Router::new().route("/whoami", get(whoami));

        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::TokenNotFound.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::UserNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::DuplicateEmail("a@b.c".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::Persistence(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
