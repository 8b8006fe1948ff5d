//! Test utilities and common setup.

use std::sync::Arc;

use tokenauth::db::Database;
use tokenauth::store::SqliteStore;
use tokenauth::{AuthConfig, AuthServices, NewUser, User};

/// Services over a fresh in-memory database, with a cheap bcrypt cost.
pub async fn test_services() -> AuthServices {
    let db = Database::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(SqliteStore::from_database(&db));
    let config = AuthConfig {
        bcrypt_cost: 4,
        ..AuthConfig::default()
    };
    AuthServices::new(store, &config).expect("Failed to build services")
}

/// Create an active user with password `Test@123` and return it.
pub async fn create_user(services: &AuthServices, email: &str) -> User {
    let id = services
        .users
        .create(NewUser {
            first_name: "Some".to_string(),
            last_name: "Guy".to_string(),
            email: email.to_string(),
            active: true,
            password: "Test@123".to_string(),
        })
        .await
        .expect("Failed to create user");

    services
        .users
        .fetch(id)
        .await
        .expect("Failed to fetch user")
        .user
}

/// Replace the first character of a plaintext token with a different one.
pub fn tamper(plaintext: &str) -> String {
    let mut chars: Vec<char> = plaintext.chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    chars.into_iter().collect()
}
