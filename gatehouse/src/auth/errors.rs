//! Authentication error types.

use thiserror::Error;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Email already registered to another account
    #[error("Email already in use")]
    EmailTaken,

    /// User not found
    #[error("User not found, please sign up")]
    UserNotFound,

    /// Password mismatch
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Login attempted from an unrecognized device; the caller must complete
    /// the emailed access-code challenge before a session is issued
    #[error("New device detected, please check your email for an access code")]
    ChallengeRequired,

    /// Submitted login code does not match the issued challenge
    #[error("Incorrect login code, please try again")]
    InvalidLoginCode,

    /// Ephemeral token missing, consumed, or past its expiry
    #[error("Invalid or expired token, please try again")]
    TokenExpiredOrInvalid,

    /// Verification requested for an already verified account
    #[error("User is already verified")]
    AlreadyVerified,

    /// Session missing or invalid
    #[error("Not authorized, please login")]
    Unauthorized,

    /// Account role is suspended
    #[error("Account suspended, please contact support")]
    Suspended,

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Login-code encryption or decryption failed
    #[error("Secret encryption failed")]
    CryptoFailed,

    /// JWT token error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Outbound email delivery failed
    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    /// Identity provider rejected or failed to verify the token
    #[error("Identity provider error: {0}")]
    IdentityProvider(String),
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database, JWT, and upstream errors are sanitized to prevent disclosure
    /// of internal system structure.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Database(_) => "Internal server error".to_string(),
            AuthError::Jwt(_) => "Authentication failed".to_string(),
            AuthError::EmailDelivery(_) => "Email not sent, please try again".to_string(),
            AuthError::IdentityProvider(_) => "Identity verification failed".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
