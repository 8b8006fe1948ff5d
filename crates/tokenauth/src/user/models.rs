//! User data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::token::Token;

/// User entity from database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub active: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// First and last name joined with a space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Request to create a user.
///
/// `password` is plaintext when handed to the user service and is replaced
/// by its hash before the request reaches a repository.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub password: String,
}

fn default_active() -> bool {
    true
}

/// A user together with their most recent unexpired token, if any.
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    #[serde(flatten)]
    pub user: User,
    pub token: Option<Token>,
}
