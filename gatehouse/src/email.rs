//! Outbound email seam.
//!
//! Delivery is an external collaborator: the state machine only needs a
//! fire-and-forget `send`. Failures surface as [`AuthError::EmailDelivery`]
//! after any token state change has already committed, so retry is always
//! caller-initiated (e.g. "resend code").

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::auth::{AuthError, AuthResult};

/// A templated email. `link` carries the flow payload: a verification or
/// reset URL, or the plaintext login code.
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub subject: String,
    pub to: String,
    pub from: String,
    pub reply_to: String,
    pub template: String,
    pub recipient_name: String,
    pub link: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> AuthResult<()>;
}

/// Logs the send instead of delivering. Default for local development.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> AuthResult<()> {
        log::info!(
            "email [{}] to {} ({}): {}",
            message.template,
            message.to,
            message.subject,
            message.link
        );
        Ok(())
    }
}

/// Records every message for inspection. Used by tests that need to read the
/// emailed code or raw token back out.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails, for upstream-error paths.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn last(&self) -> Option<EmailMessage> {
        self.sent.lock().await.last().cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> AuthResult<()> {
        if self.fail {
            return Err(AuthError::EmailDelivery("relay unavailable".to_string()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}
