//! In-memory store implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::auth::{AuthError, AuthResult, AuthToken, TokenSecret, User, UserId};

use super::{TokenStore, UserStore};

/// HashMap-backed implementation of both store traits. Tokens are keyed by
/// user id, which makes the single-live-token invariant structural.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    tokens: RwLock<HashMap<UserId, AuthToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: User) -> AuthResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(AuthError::EmailTaken);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn save(&self, user: &User) -> AuthResult<()> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: UserId) -> AuthResult<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn list(&self) -> AuthResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn replace(&self, token: AuthToken) -> AuthResult<()> {
        let mut tokens = self.tokens.write().await;
        tokens.remove(&token.user_id);
        tokens.insert(token.user_id, token);
        Ok(())
    }

    async fn find_live_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AuthToken>> {
        Ok(self
            .tokens
            .read()
            .await
            .get(&user_id)
            .filter(|t| t.is_live(now))
            .cloned())
    }

    async fn find_live_by_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AuthToken>> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .find(|t| {
                t.is_live(now)
                    && match &t.secret {
                        TokenSecret::EmailVerification { digest: d }
                        | TokenSecret::PasswordReset { digest: d } => d == digest,
                        TokenSecret::LoginCode { .. } => false,
                    }
            })
            .cloned())
    }

    async fn delete_for_user(&self, user_id: UserId) -> AuthResult<()> {
        self.tokens.write().await.remove(&user_id);
        Ok(())
    }
}
