//! Authentication manager implementation.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use crate::crypto::{self, SecretCodec};
use crate::email::{EmailMessage, Mailer};
use crate::identity::IdentityVerifier;
use crate::session::SessionIssuer;
use crate::store::{TokenStore, UserStore};

use super::{
    errors::{AuthError, AuthResult},
    models::{AuthToken, LoginRequest, ProfileUpdate, RegisterRequest, Role, TokenSecret, User,
             UserId},
};

/// Minimum accepted password length. No further complexity policy.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Sender addresses and the frontend base URL stamped onto outbound mail.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub from: String,
    pub reply_to: String,
    pub frontend_url: String,
}

/// Authentication manager.
///
/// Every collaborator is injected: stores, mailer, identity verifier, codec,
/// and session issuer are constructed by the caller, so the state machine
/// runs unchanged against Postgres or the in-memory store.
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    mailer: Arc<dyn Mailer>,
    identity: Arc<dyn IdentityVerifier>,
    codec: SecretCodec,
    sessions: SessionIssuer,
    pepper: String,
    mail: MailSettings,
}

impl AuthManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        mailer: Arc<dyn Mailer>,
        identity: Arc<dyn IdentityVerifier>,
        codec: SecretCodec,
        sessions: SessionIssuer,
        pepper: String,
        mail: MailSettings,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
            identity,
            codec,
            sessions,
            pepper,
            mail,
        }
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Register a new user and issue a session credential immediately.
    ///
    /// Registration implies trust of the registering device, so `user_agent`
    /// seeds the known-device list and no challenge is required.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - missing field or password under the minimum length
    /// * `AuthError::EmailTaken` - email already registered
    pub async fn register(
        &self,
        request: RegisterRequest,
        user_agent: &str,
    ) -> AuthResult<(User, String)> {
        if request.name.is_empty() || request.email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(
                "Please fill in all the required fields".to_string(),
            ));
        }
        validate_password(&request.password)?;

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let user = User {
            id: Uuid::new_v4(),
            name: request.name,
            email: request.email,
            password_hash: self.hash_password(&request.password)?,
            phone: None,
            bio: None,
            photo: None,
            role: Role::User,
            is_verified: false,
            user_agents: vec![user_agent.to_string()],
            created_at: Utc::now(),
        };
        let user = self.users.create(user).await?;
        info!("registered user {}", user.id);

        let session = self.sessions.issue(user.id)?;
        Ok((user, session))
    }

    /// Login with email and password.
    ///
    /// If the request's user agent is not in the user's known-device list,
    /// no credential is issued: a fresh encrypted six-digit challenge code
    /// replaces any existing ephemeral token and the call fails with
    /// `ChallengeRequired`. The caller must complete
    /// [`AuthManager::login_with_code`] next.
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - no account for the email
    /// * `AuthError::InvalidCredentials` - password mismatch
    /// * `AuthError::ChallengeRequired` - unrecognized device, code issued
    pub async fn login(
        &self,
        request: LoginRequest,
        user_agent: &str,
    ) -> AuthResult<(User, String)> {
        if request.email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(
                "Please add email and password".to_string(),
            ));
        }

        let user = self
            .users
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.verify_password(&request.password, &user.password_hash)?;

        if !user.knows_device(user_agent) {
            let code = crypto::generate_login_code();
            let ciphertext = self.codec.encrypt(&code)?;
            self.tokens
                .replace(AuthToken::login_code(user.id, ciphertext, Utc::now()))
                .await?;
            debug!("login challenge issued for user {}", user.id);
            return Err(AuthError::ChallengeRequired);
        }

        let session = self.sessions.issue(user.id)?;
        Ok((user, session))
    }

    /// Email the user their pending login challenge code.
    ///
    /// The code is decrypted from the stored token; issuing happens in
    /// [`AuthManager::login`], this only (re)delivers it.
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - no account for the email
    /// * `AuthError::TokenExpiredOrInvalid` - no live login-code token
    /// * `AuthError::EmailDelivery` - send failed; the token stays live
    pub async fn send_login_code(&self, email: &str) -> AuthResult<()> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let token = self
            .tokens
            .find_live_for_user(user.id, Utc::now())
            .await?
            .ok_or(AuthError::TokenExpiredOrInvalid)?;
        let TokenSecret::LoginCode { ciphertext } = &token.secret else {
            return Err(AuthError::TokenExpiredOrInvalid);
        };

        let code = self.codec.decrypt(ciphertext)?;
        self.send_mail(&user, "Login Access Code", "login_code", code)
            .await
    }

    /// Complete a device challenge with the emailed code.
    ///
    /// On match the submitting user agent is permanently added to the user's
    /// known devices, the token is consumed, and a session credential is
    /// issued.
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - no account for the email
    /// * `AuthError::TokenExpiredOrInvalid` - no live login-code token
    /// * `AuthError::InvalidLoginCode` - code mismatch
    pub async fn login_with_code(
        &self,
        email: &str,
        submitted_code: &str,
        user_agent: &str,
    ) -> AuthResult<(User, String)> {
        let mut user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let token = self
            .tokens
            .find_live_for_user(user.id, Utc::now())
            .await?
            .ok_or(AuthError::TokenExpiredOrInvalid)?;
        let TokenSecret::LoginCode { ciphertext } = &token.secret else {
            return Err(AuthError::TokenExpiredOrInvalid);
        };

        let code = self.codec.decrypt(ciphertext)?;
        if !crypto::constant_time_eq(&code, submitted_code) {
            return Err(AuthError::InvalidLoginCode);
        }

        if !user.knows_device(user_agent) {
            user.user_agents.push(user_agent.to_string());
        }
        self.users.save(&user).await?;
        // Consume the code so it cannot be replayed.
        self.tokens.delete_for_user(user.id).await?;
        info!("device trusted for user {}", user.id);

        let session = self.sessions.issue(user.id)?;
        Ok((user, session))
    }

    /// Issue an email-verification token and mail the verification link.
    ///
    /// The raw secret is 32 random bytes hex-encoded with the user id
    /// appended; only its digest is stored.
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - unknown user id
    /// * `AuthError::AlreadyVerified` - account already verified
    /// * `AuthError::EmailDelivery` - send failed; the token stays live
    pub async fn request_email_verification(&self, user_id: UserId) -> AuthResult<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let raw = format!("{}{}", crypto::generate_token_secret(), user.id);
        self.tokens
            .replace(AuthToken::email_verification(
                user.id,
                crypto::digest(&raw),
                Utc::now(),
            ))
            .await?;

        let link = format!("{}/verify/{}", self.mail.frontend_url, raw);
        self.send_mail(&user, "Verify Your Account", "verify_email", link)
            .await
    }

    /// Verify an account with the raw token from the emailed link.
    ///
    /// # Errors
    ///
    /// * `AuthError::TokenExpiredOrInvalid` - digest unknown or token expired
    /// * `AuthError::AlreadyVerified` - owning account already verified
    pub async fn verify_email(&self, raw_token: &str) -> AuthResult<()> {
        let token = self
            .tokens
            .find_live_by_digest(&crypto::digest(raw_token), Utc::now())
            .await?
            .ok_or(AuthError::TokenExpiredOrInvalid)?;
        if !matches!(token.secret, TokenSecret::EmailVerification { .. }) {
            return Err(AuthError::TokenExpiredOrInvalid);
        }

        let mut user = self
            .users
            .find_by_id(token.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        user.is_verified = true;
        self.users.save(&user).await?;
        self.tokens.delete_for_user(user.id).await?;
        info!("user {} verified", user.id);
        Ok(())
    }

    /// Issue a password-reset token and mail the reset link.
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - no account for the email
    /// * `AuthError::EmailDelivery` - send failed; the token stays live
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let raw = format!("{}{}", crypto::generate_token_secret(), user.id);
        self.tokens
            .replace(AuthToken::password_reset(
                user.id,
                crypto::digest(&raw),
                Utc::now(),
            ))
            .await?;

        let link = format!("{}/resetPassword/{}", self.mail.frontend_url, raw);
        self.send_mail(&user, "Password Reset Request", "forgot_password", link)
            .await
    }

    /// Set a new password with the raw token from the emailed link.
    ///
    /// Deliberately does not issue a session: the caller logs in with the
    /// new password afterwards.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - new password under the minimum length
    /// * `AuthError::TokenExpiredOrInvalid` - digest unknown or token expired
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;

        let token = self
            .tokens
            .find_live_by_digest(&crypto::digest(raw_token), Utc::now())
            .await?
            .ok_or(AuthError::TokenExpiredOrInvalid)?;
        if !matches!(token.secret, TokenSecret::PasswordReset { .. }) {
            return Err(AuthError::TokenExpiredOrInvalid);
        }

        let mut user = self
            .users
            .find_by_id(token.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        user.password_hash = self.hash_password(new_password)?;
        self.users.save(&user).await?;
        self.tokens.delete_for_user(user.id).await?;
        info!("password reset for user {}", user.id);
        Ok(())
    }

    /// Change the password of a logged-in user.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - missing passwords or new one too short
    /// * `AuthError::InvalidCredentials` - old password mismatch
    pub async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if old_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::Validation(
                "Please enter old and new password".to_string(),
            ));
        }
        validate_password(new_password)?;
        self.verify_password(old_password, &user.password_hash)?;

        user.password_hash = self.hash_password(new_password)?;
        self.users.save(&user).await?;
        Ok(())
    }

    /// Login through a third-party identity provider.
    ///
    /// The raw identity token is verified by the injected black-box
    /// verifier. Unknown emails get a fresh account: pre-verified, device
    /// list seeded with the current user agent, and a random unguessable
    /// placeholder password (never communicated, only satisfies storage).
    /// Existing and new users both receive a session credential.
    ///
    /// # Errors
    ///
    /// * `AuthError::IdentityProvider` - verification failed upstream
    pub async fn login_with_identity(
        &self,
        raw_identity_token: &str,
        user_agent: &str,
    ) -> AuthResult<(User, String)> {
        let identity = self.identity.verify(raw_identity_token).await?;

        let user = match self.users.find_by_email(&identity.email).await? {
            Some(user) => user,
            None => {
                let user = User {
                    id: Uuid::new_v4(),
                    name: identity.name,
                    email: identity.email,
                    password_hash: self.hash_password(&crypto::generate_token_secret())?,
                    phone: None,
                    bio: None,
                    photo: identity.picture,
                    role: Role::User,
                    is_verified: true,
                    user_agents: vec![user_agent.to_string()],
                    created_at: Utc::now(),
                };
                let user = self.users.create(user).await?;
                info!("provisioned identity-provider user {}", user.id);
                user
            }
        };

        let session = self.sessions.issue(user.id)?;
        Ok((user, session))
    }

    /// Resolve a session credential into its (non-suspended) user.
    ///
    /// Invalid or expired credentials and missing users all collapse into
    /// `Unauthorized`; a suspended role fails with `Suspended`.
    pub async fn authenticate(&self, credential: &str) -> AuthResult<User> {
        let user_id = self
            .sessions
            .validate(credential)
            .map_err(|_| AuthError::Unauthorized)?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if user.role == Role::Suspended {
            return Err(AuthError::Suspended);
        }
        Ok(user)
    }

    /// Non-erroring session probe: is this credential currently valid?
    pub fn login_status(&self, credential: &str) -> bool {
        self.sessions.validate(credential).is_ok()
    }

    pub async fn get_user(&self, user_id: UserId) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Apply a partial profile update. Email and role are not writable here.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> AuthResult<User> {
        let mut user = self.get_user(user_id).await?;
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(bio) = update.bio {
            user.bio = Some(bio);
        }
        if let Some(photo) = update.photo {
            user.photo = Some(photo);
        }
        self.users.save(&user).await?;
        Ok(user)
    }

    /// Admin: hard-delete a user.
    pub async fn delete_user(&self, user_id: UserId) -> AuthResult<()> {
        if !self.users.delete(user_id).await? {
            return Err(AuthError::UserNotFound);
        }
        info!("deleted user {user_id}");
        Ok(())
    }

    /// Admin: all users, newest first.
    pub async fn list_users(&self) -> AuthResult<Vec<User>> {
        self.users.list().await
    }

    /// Admin: change a user's role.
    pub async fn upgrade_role(&self, user_id: UserId, role: Role) -> AuthResult<User> {
        let mut user = self.get_user(user_id).await?;
        user.role = role;
        self.users.save(&user).await?;
        info!("user {} role set to {}", user.id, role.as_str());
        Ok(user)
    }

    /// Send a templated email to an existing user, linking back into the
    /// frontend at `url_path`.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - missing parameters
    /// * `AuthError::UserNotFound` - no account for the address
    /// * `AuthError::EmailDelivery` - send failed
    pub async fn send_user_email(
        &self,
        subject: &str,
        to: &str,
        reply_to: &str,
        template: &str,
        url_path: &str,
    ) -> AuthResult<()> {
        if subject.is_empty() || to.is_empty() || reply_to.is_empty() || template.is_empty() {
            return Err(AuthError::Validation(
                "Missing email parameters".to_string(),
            ));
        }
        let user = self
            .users
            .find_by_email(to)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let link = format!("{}{}", self.mail.frontend_url, url_path);
        let message = EmailMessage {
            subject: subject.to_string(),
            to: user.email.clone(),
            from: self.mail.from.clone(),
            reply_to: reply_to.to_string(),
            template: template.to_string(),
            recipient_name: user.name.clone(),
            link,
        };
        self.mailer.send(&message).await
    }

    async fn send_mail(
        &self,
        user: &User,
        subject: &str,
        template: &str,
        link: String,
    ) -> AuthResult<()> {
        let message = EmailMessage {
            subject: subject.to_string(),
            to: user.email.clone(),
            from: self.mail.from.clone(),
            reply_to: self.mail.reply_to.clone(),
            template: template.to_string(),
            recipient_name: user.name.clone(),
            link,
        };
        self.mailer.send(&message).await
    }

    /// Hash password with Argon2id + pepper
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        Ok(argon2
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Verify password against hash
    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
        let argon2 = Argon2::default();

        argon2
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
