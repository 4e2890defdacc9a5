//! # Gatehouse
//!
//! Account and session management for cookie-based web applications.
//!
//! The library is organized around a single orchestrator, [`auth::AuthManager`],
//! which drives every authentication flow as an explicit state transition:
//!
//! - **Registration** creates a user with a hashed password and pre-trusts the
//!   registering device.
//! - **Login** checks credentials, then branches on device trust: a known
//!   user agent receives a session credential immediately, an unknown one
//!   triggers an emailed six-digit challenge code.
//! - **Code verification** promotes the submitting device to the user's known
//!   device list and issues the withheld session credential.
//! - **Email verification** and **password reset** run on short-lived hashed
//!   tokens, at most one live token per user at any time.
//! - **Third-party identity login** verifies an external identity token and
//!   provisions a pre-verified account on first sight.
//!
//! Collaborators are injected as trait objects so the state machine can be
//! exercised without a database, SMTP relay, or identity provider:
//!
//! - [`store`]: user and ephemeral-token persistence (Postgres or in-memory)
//! - [`email`]: fire-and-forget outbound mail
//! - [`identity`]: black-box third-party identity verification
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gatehouse::auth::{AuthManager, MailSettings, RegisterRequest};
//! use gatehouse::crypto::SecretCodec;
//! use gatehouse::email::LogMailer;
//! use gatehouse::identity::GoogleVerifier;
//! use gatehouse::session::SessionIssuer;
//! use gatehouse::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let auth = AuthManager::new(
//!         store.clone(),
//!         store,
//!         Arc::new(LogMailer),
//!         Arc::new(GoogleVerifier::new("client-id".to_string())),
//!         SecretCodec::new("code_encryption_key"),
//!         SessionIssuer::new("jwt_secret".to_string()),
//!         "password_pepper".to_string(),
//!         MailSettings {
//!             from: "accounts@example.com".to_string(),
//!             reply_to: "noreply@example.com".to_string(),
//!             frontend_url: "https://app.example.com".to_string(),
//!         },
//!     );
//!
//!     let request = RegisterRequest {
//!         name: "Ada".to_string(),
//!         email: "ada@example.com".to_string(),
//!         password: "secret1".to_string(),
//!     };
//!     let (user, _session) = auth.register(request, "Mozilla/5.0").await?;
//!     println!("registered {}", user.email);
//!     Ok(())
//! }
//! ```

/// Authentication state machine, models, and errors.
pub mod auth;
pub use auth::{AuthError, AuthManager, AuthResult, MailSettings};

/// Hashing and reversible encryption for ephemeral secrets.
pub mod crypto;
pub use crypto::SecretCodec;

/// Outbound email seam.
pub mod email;

/// Third-party identity verification seam.
pub mod identity;

/// Session credential issuance and validation.
pub mod session;
pub use session::SessionIssuer;

/// User and ephemeral-token stores.
pub mod store;
