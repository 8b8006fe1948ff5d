//! Authorization header access and bearer-token parsing.

use std::collections::HashMap;

use axum::http::{HeaderMap, Request};

use crate::error::{AuthError, AuthResult};

/// Name of the header carrying the bearer token.
pub const AUTHORIZATION: &str = "Authorization";

/// Scheme prefix expected in the authorization header.
pub const BEARER_SCHEME: &str = "Bearer";

/// Anything an inbound request's headers can be read from.
pub trait HeaderSource {
    /// Raw bytes of the header `name`, if present.
    fn header_bytes(&self, name: &str) -> Option<&[u8]>;

    /// Value of the header `name`, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str> {
        self.header_bytes(name)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

impl HeaderSource for HeaderMap {
    fn header_bytes(&self, name: &str) -> Option<&[u8]> {
        self.get(name).map(|v| v.as_bytes())
    }
}

impl<B> HeaderSource for Request<B> {
    fn header_bytes(&self, name: &str) -> Option<&[u8]> {
        self.headers().header_bytes(name)
    }
}

/// Header names are matched case-insensitively.
impl HeaderSource for HashMap<String, String> {
    fn header_bytes(&self, name: &str) -> Option<&[u8]> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_bytes())
    }
}

/// Decode a raw header value. A value that is present but not UTF-8 is
/// malformed, not missing.
pub fn header_text(raw: Option<&[u8]>) -> AuthResult<Option<&str>> {
    raw.map(|bytes| std::str::from_utf8(bytes).map_err(|_| AuthError::MalformedHeader))
        .transpose()
}

/// Extract the token from an `Authorization` value of the form
/// `Bearer <token>`, where `<token>` is exactly `expected_len` bytes.
pub fn bearer_token(header: Option<&str>, expected_len: usize) -> AuthResult<&str> {
    let header = match header {
        Some(h) if !h.is_empty() => h,
        _ => return Err(AuthError::MissingAuthHeader),
    };

    let parts: Vec<&str> = header.split(' ').collect();
    let token = match parts.as_slice() {
        [scheme, token] if *scheme == BEARER_SCHEME => *token,
        _ => return Err(AuthError::MalformedHeader),
    };

    if token.len() != expected_len {
        return Err(AuthError::InvalidLength {
            expected: expected_len,
            actual: token.len(),
        });
    }

    Ok(token)
}
