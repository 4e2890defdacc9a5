//! Authentication module providing registration, login, device-trust
//! challenges, email verification, password reset, and third-party identity
//! login.
//!
//! Login is a small state machine per attempt:
//!
//! ```text
//! Anonymous -> CredentialChecked -> DeviceTrusted   -> Authenticated
//!                               \-> DeviceUntrusted -> ChallengeIssued
//! ```
//!
//! A challenge is a six-digit code, stored encrypted with a 60-minute expiry
//! and emailed to the account address. Completing the challenge permanently
//! trusts the submitting device (its user-agent string joins the user's
//! known-device list) and issues the withheld session credential.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{AuthError, AuthResult};
pub use manager::{AuthManager, MIN_PASSWORD_LEN, MailSettings};
pub use models::{
    AuthToken, LoginRequest, ProfileUpdate, RegisterRequest, Role, TOKEN_TTL_MINUTES, TokenSecret,
    User, UserId,
};
