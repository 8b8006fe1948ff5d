//! SQLite implementation of the user and token repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::{RecordId, TokenRepository, UserRepository};
use crate::db::Database;
use crate::error::{AuthError, AuthResult};
use crate::token::{NewToken, Token, TokenDigest};
use crate::user::{NewUser, User};

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, active, password_hash, created_at, updated_at";

const TOKEN_COLUMNS: &str =
    "id, user_id, first_name, email, token_hash, created_at, updated_at, expiry";

/// Repository for users and tokens stored in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a store over an existing pool. The schema must already exist.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a store over a migrated database.
    pub fn from_database(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Map a unique-constraint violation on `users.email` to `DuplicateEmail`.
fn map_email_conflict(err: sqlx::Error, email: &str) -> AuthError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AuthError::DuplicateEmail(email.to_string())
        }
        other => other.into(),
    }
}

#[async_trait]
impl UserRepository for SqliteStore {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn insert_user(&self, user: &NewUser) -> AuthResult<RecordId> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (first_name, last_name, email, active, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.active)
        .bind(&user.password)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_email_conflict(e, &user.email))?;

        let id = result.last_insert_rowid();
        debug!("inserted user {}", id);
        Ok(RecordId::Int(id))
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: i64) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> AuthResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY last_name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update_user(&self, user: &User) -> AuthResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = ?, last_name = ?, email = ?, active = ?, password_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.active)
        .bind(&user.password_hash)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_email_conflict(e, &user.email))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: i64) -> AuthResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!("deleted {} user row(s)", result.rows_affected());
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for SqliteStore {
    #[instrument(skip(self, token, owner), fields(user_id = owner.id))]
    async fn replace_token(&self, token: &NewToken, owner: &User) -> AuthResult<Token> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM tokens WHERE user_id = ?")
            .bind(owner.id)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO tokens (user_id, first_name, email, token_hash, created_at, updated_at, expiry)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner.id)
        .bind(&owner.first_name)
        .bind(&owner.email)
        .bind(&token.token_hash[..])
        .bind(now)
        .bind(now)
        .bind(token.expiry)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            "replaced {} token(s) for user {}",
            removed.rows_affected(),
            owner.id
        );

        Ok(Token {
            id: inserted.last_insert_rowid(),
            user_id: owner.id,
            first_name: owner.first_name.clone(),
            email: owner.email.clone(),
            token_hash: token.token_hash.to_vec(),
            created_at: now,
            updated_at: now,
            expiry: token.expiry,
        })
    }

    #[instrument(skip(self))]
    async fn get_token(&self, id: i64) -> AuthResult<Option<Token>> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    #[instrument(skip_all)]
    async fn get_token_by_hash(&self, hash: &TokenDigest) -> AuthResult<Option<Token>> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_hash = ? LIMIT 1"
        ))
        .bind(&hash[..])
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self))]
    async fn tokens_for_user(&self, user_id: i64) -> AuthResult<Vec<Token>> {
        let tokens = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    #[instrument(skip(self))]
    async fn latest_live_token(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Token>> {
        let token = sqlx::query_as::<_, Token>(&format!(
            r#"
            SELECT {TOKEN_COLUMNS} FROM tokens
            WHERE user_id = ? AND expiry > ?
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self))]
    async fn delete_token(&self, id: i64) -> AuthResult<()> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!("deleted {} token row(s)", result.rows_affected());
        Ok(())
    }

    #[instrument(skip_all)]
    async fn delete_token_by_hash(&self, hash: &TokenDigest) -> AuthResult<()> {
        let result = sqlx::query("DELETE FROM tokens WHERE token_hash = ?")
            .bind(&hash[..])
            .execute(&self.pool)
            .await?;

        debug!("deleted {} token row(s)", result.rows_affected());
        Ok(())
    }
}
