//! User management module.
//!
//! Provides the user model and account lifecycle operations.

mod models;
mod service;

pub use models::{NewUser, User, UserAccount};
pub use service::UserService;
