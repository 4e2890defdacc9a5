//! Postgres store implementation.
//!
//! Schema lives in `schema.sql` at the crate root: a `users` table and an
//! `auth_tokens` table keyed by `user_id` (primary key, so one token row per
//! user at the database level too).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::auth::{AuthError, AuthResult, AuthToken, Role, TokenSecret, User, UserId};

use super::{TokenStore, UserStore};

/// Postgres-backed implementation of both store traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_user(row: &PgRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        phone: row.get("phone"),
        bio: row.get("bio"),
        photo: row.get("photo"),
        role: Role::parse(&role).unwrap_or(Role::User),
        is_verified: row.get("is_verified"),
        user_agents: row.get("user_agents"),
        created_at: row.get("created_at"),
    }
}

fn row_to_token(row: &PgRow) -> AuthResult<AuthToken> {
    let login_code: Option<String> = row.get("login_code_ciphertext");
    let verification: Option<String> = row.get("verification_digest");
    let reset: Option<String> = row.get("reset_digest");

    let secret = if let Some(ciphertext) = login_code {
        TokenSecret::LoginCode { ciphertext }
    } else if let Some(digest) = verification {
        TokenSecret::EmailVerification { digest }
    } else if let Some(digest) = reset {
        TokenSecret::PasswordReset { digest }
    } else {
        // A row with no secret column set cannot be consumed by any flow.
        return Err(AuthError::TokenExpiredOrInvalid);
    };

    Ok(AuthToken {
        user_id: row.get("user_id"),
        secret,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    })
}

fn token_columns(secret: &TokenSecret) -> (Option<&str>, Option<&str>, Option<&str>) {
    match secret {
        TokenSecret::LoginCode { ciphertext } => (Some(ciphertext.as_str()), None, None),
        TokenSecret::EmailVerification { digest } => (None, Some(digest.as_str()), None),
        TokenSecret::PasswordReset { digest } => (None, None, Some(digest.as_str())),
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, phone, bio, photo, role, is_verified, \
                            user_agents, created_at";

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: User) -> AuthResult<User> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, phone, bio, photo, role, \
             is_verified, user_agents, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(&user.bio)
        .bind(&user.photo)
        .bind(user.role.as_str())
        .bind(user.is_verified)
        .bind(&user.user_agents)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AuthError::EmailTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn save(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            "UPDATE users SET name = $2, password_hash = $3, phone = $4, bio = $5, photo = $6, \
             role = $7, is_verified = $8, user_agents = $9 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(&user.bio)
        .bind(&user.photo)
        .bind(user.role.as_str())
        .bind(user.is_verified)
        .bind(&user.user_agents)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: UserId) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> AuthResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_user).collect())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn replace(&self, token: AuthToken) -> AuthResult<()> {
        // Delete-then-insert as two statements. A crash in between leaves
        // the user token-less, never with two live tokens.
        sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(token.user_id)
            .execute(&self.pool)
            .await?;

        let (login_code, verification, reset) = token_columns(&token.secret);
        sqlx::query(
            "INSERT INTO auth_tokens (user_id, login_code_ciphertext, verification_digest, \
             reset_digest, created_at, expires_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(token.user_id)
        .bind(login_code)
        .bind(verification)
        .bind(reset)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_live_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AuthToken>> {
        let row = sqlx::query(
            "SELECT user_id, login_code_ciphertext, verification_digest, reset_digest, \
             created_at, expires_at FROM auth_tokens WHERE user_id = $1 AND expires_at > $2",
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_token).transpose()
    }

    async fn find_live_by_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AuthToken>> {
        let row = sqlx::query(
            "SELECT user_id, login_code_ciphertext, verification_digest, reset_digest, \
             created_at, expires_at FROM auth_tokens \
             WHERE (verification_digest = $1 OR reset_digest = $1) AND expires_at > $2",
        )
        .bind(digest)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_token).transpose()
    }

    async fn delete_for_user(&self, user_id: UserId) -> AuthResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
