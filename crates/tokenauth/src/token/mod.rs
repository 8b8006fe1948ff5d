//! Bearer tokens.
//!
//! Provides plaintext generation, the persisted token model, and the service
//! that issues, finds and deletes tokens.

mod factory;
mod models;
mod service;

pub use factory::{PAD_CHAR, TOKEN_ENTROPY_BYTES, TokenFactory};
pub use models::{IssuedToken, NewToken, Token, TokenDigest, digest};
pub use service::TokenService;
