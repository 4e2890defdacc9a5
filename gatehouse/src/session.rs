//! Session credential issuance and validation.
//!
//! A session credential is a signed JWT carrying the user id, valid for 24
//! hours. Transport (the `token` cookie) is the HTTP boundary's concern;
//! this module only mints and checks the bearer artifact. Revocation is
//! client-side cookie clearing only, there is no server-side blacklist.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthResult, UserId};

/// Default session validity.
pub const SESSION_TTL_HOURS: i64 = 24;

/// JWT claims for the session credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and validates session credentials with a process-wide signing secret.
#[derive(Clone)]
pub struct SessionIssuer {
    secret: String,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    /// Override the default 24-hour validity.
    pub fn with_ttl(secret: String, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a credential embedding `user_id`.
    pub fn issue(&self, user_id: UserId) -> AuthResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Verify signature and expiry, returning the embedded user id.
    pub fn validate(&self, token: &str) -> AuthResult<UserId> {
        let data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn issue_and_validate_round_trip() {
        let issuer = SessionIssuer::new("test_secret_key_for_jwt".to_string());
        let user_id = Uuid::new_v4();
        let token = issuer.issue(user_id).unwrap();
        assert_eq!(issuer.validate(&token).unwrap(), user_id);
    }

    #[test]
    fn validate_rejects_wrong_secret() {
        let issuer = SessionIssuer::new("secret_a".to_string());
        let other = SessionIssuer::new("secret_b".to_string());
        let token = issuer.issue(Uuid::new_v4()).unwrap();
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn validate_rejects_expired_credential() {
        // Two hours in the past clears the default decode leeway.
        let issuer =
            SessionIssuer::with_ttl("test_secret_key_for_jwt".to_string(), Duration::hours(-2));
        let token = issuer.issue(Uuid::new_v4()).unwrap();
        assert!(issuer.validate(&token).is_err());
    }

    #[test]
    fn validate_rejects_garbage() {
        let issuer = SessionIssuer::new("test_secret_key_for_jwt".to_string());
        assert!(issuer.validate("not-a-jwt").is_err());
    }
}
