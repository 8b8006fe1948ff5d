//! Request authentication.
//!
//! Parses `Authorization: Bearer <token>` headers, resolves the owning user
//! and exposes the result to axum handlers.

mod authenticator;
mod header;
mod middleware;

pub use authenticator::Authenticator;
pub use header::{AUTHORIZATION, BEARER_SCHEME, HeaderSource, bearer_token, header_text};
pub use middleware::{AuthErrorResponse, CurrentUser, auth_middleware};
