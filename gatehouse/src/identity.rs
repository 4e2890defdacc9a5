//! Third-party identity verification seam.
//!
//! The provider is a black box: given a raw identity token it either yields
//! the verified profile fields or fails. The state machine never inspects
//! the token itself.

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::{AuthError, AuthResult};

/// Profile fields asserted by the identity provider.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
    pub subject_id: String,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, raw_token: &str) -> AuthResult<VerifiedIdentity>;
}

/// Verifies Google ID tokens against the tokeninfo endpoint and checks the
/// audience against the configured client id.
pub struct GoogleVerifier {
    client: reqwest::Client,
    client_id: String,
}

impl GoogleVerifier {
    pub fn new(client_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, raw_token: &str) -> AuthResult<VerifiedIdentity> {
        let info: TokenInfo = self
            .client
            .get("https://oauth2.googleapis.com/tokeninfo")
            .query(&[("id_token", raw_token)])
            .send()
            .await
            .map_err(|e| AuthError::IdentityProvider(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::IdentityProvider(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::IdentityProvider(e.to_string()))?;

        if info.aud != self.client_id {
            return Err(AuthError::IdentityProvider("audience mismatch".to_string()));
        }

        Ok(VerifiedIdentity {
            name: info.name.unwrap_or_else(|| info.email.clone()),
            email: info.email,
            picture: info.picture,
            subject_id: info.sub,
        })
    }
}

/// Returns a fixed identity for any token. Test double for the provider.
pub struct StaticVerifier {
    identity: VerifiedIdentity,
}

impl StaticVerifier {
    pub fn new(identity: VerifiedIdentity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, _raw_token: &str) -> AuthResult<VerifiedIdentity> {
        Ok(self.identity.clone())
    }
}
