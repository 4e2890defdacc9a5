//! Authentication data models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User ID type
pub type UserId = Uuid;

/// Lifetime of every ephemeral token (login code, verification, reset).
pub const TOKEN_TTL_MINUTES: i64 = 60;

/// User role. `Suspended` locks the account out of every session-gated
/// operation without deleting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Author,
    Admin,
    Suspended,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Author => "author",
            Role::Admin => "admin",
            Role::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "user" => Some(Role::User),
            "author" => Some(Role::Author),
            "admin" => Some(Role::Admin),
            "suspended" => Some(Role::Suspended),
            _ => None,
        }
    }
}

/// User model. `user_agents` is the known-device list: every entry is a user
/// agent that has completed a code-verified login (or registered the account).
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub user_agents: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn knows_device(&self, user_agent: &str) -> bool {
        self.user_agents.iter().any(|ua| ua == user_agent)
    }
}

/// The secret carried by an ephemeral token. Exactly one kind per token:
/// login codes are stored encrypted because the plaintext must be recovered
/// to email it, verification and reset secrets are stored as one-way digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSecret {
    LoginCode { ciphertext: String },
    EmailVerification { digest: String },
    PasswordReset { digest: String },
}

/// Ephemeral single-per-user token record. Expiry is enforced lazily: every
/// store read filters on `expires_at`, no background sweep exists.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub user_id: UserId,
    pub secret: TokenSecret,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    fn new(user_id: UserId, secret: TokenSecret, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            secret,
            created_at: now,
            expires_at: now + Duration::minutes(TOKEN_TTL_MINUTES),
        }
    }

    pub fn login_code(user_id: UserId, ciphertext: String, now: DateTime<Utc>) -> Self {
        Self::new(user_id, TokenSecret::LoginCode { ciphertext }, now)
    }

    pub fn email_verification(user_id: UserId, digest: String, now: DateTime<Utc>) -> Self {
        Self::new(user_id, TokenSecret::EmailVerification { digest }, now)
    }

    pub fn password_reset(user_id: UserId, digest: String, now: DateTime<Utc>) -> Self {
        Self::new(user_id, TokenSecret::PasswordReset { digest }, now)
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial profile update. `None` fields keep their current value; email and
/// role are never writable through this path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
}
