//! User and ephemeral-token stores.
//!
//! Trait-based abstractions over persistence, enabling dependency injection
//! and database-free tests. Two implementations ship with the library:
//! [`PgStore`] (Postgres via sqlx) and [`MemoryStore`] (in-process, used by
//! tests and demos).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::{AuthResult, AuthToken, User, UserId};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Trait for user persistence operations
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user. Fails on duplicate email.
    async fn create(&self, user: User) -> AuthResult<User>;

    /// Find user by ID
    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>>;

    /// Find user by email
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Persist changes to an existing user
    async fn save(&self, user: &User) -> AuthResult<()>;

    /// Hard-delete a user. Returns whether a record existed.
    async fn delete(&self, id: UserId) -> AuthResult<bool>;

    /// All users, newest first.
    async fn list(&self) -> AuthResult<Vec<User>>;
}

/// Trait for ephemeral-token persistence operations.
///
/// The single-live-token invariant lives here: [`TokenStore::replace`]
/// removes any existing token for the owning user before inserting, so a
/// fresh reset request invalidates a pending verification and vice versa.
/// Every read filters on `expires_at`, expired rows are never returned.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Delete any existing token for `token.user_id`, then insert.
    ///
    /// Not transactional: a crash in between leaves the user token-less
    /// (forcing a re-request), never with two live tokens.
    async fn replace(&self, token: AuthToken) -> AuthResult<()>;

    /// The user's live token, if any.
    async fn find_live_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AuthToken>>;

    /// Live token whose verification or reset digest matches.
    async fn find_live_by_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AuthToken>>;

    /// Remove the user's token, if any. Consumption on successful use.
    async fn delete_for_user(&self, user_id: UserId) -> AuthResult<()>;
}
