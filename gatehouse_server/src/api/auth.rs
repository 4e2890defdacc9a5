//! Credential flow handlers.
//!
//! Every flow that issues a session credential sets it both as an HTTP-only
//! `token` cookie and, where the historical API contract includes it, as a
//! `token` field in the JSON body. Plain password login deliberately omits
//! the body field; registration, code login, and identity login include it.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use gatehouse::auth::{AuthError, LoginRequest, RegisterRequest, Role, User, UserId};
use gatehouse::session::SESSION_TTL_HOURS;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::middleware;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginWithCodePayload {
    pub login_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordPayload {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordPayload {
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    pub old_password: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCallbackPayload {
    pub user_token: String,
}

/// Public user projection. Never carries the password hash; `token` is only
/// present on flows that issue a fresh credential in the body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl UserResponse {
    pub fn from_user(user: &User, token: Option<String>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            bio: user.bio.clone(),
            photo: user.photo.clone(),
            role: user.role,
            is_verified: user.is_verified,
            token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error onto an HTTP status at the boundary. Internals are
/// sanitized through `client_message`.
pub fn error_response(err: AuthError) -> ApiError {
    let status = match &err {
        AuthError::Validation(_) | AuthError::AlreadyVerified => StatusCode::BAD_REQUEST,
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::UserNotFound | AuthError::TokenExpiredOrInvalid => StatusCode::NOT_FOUND,
        AuthError::InvalidCredentials
        | AuthError::InvalidLoginCode
        | AuthError::Unauthorized
        | AuthError::Suspended => StatusCode::UNAUTHORIZED,
        AuthError::ChallengeRequired => StatusCode::FORBIDDEN,
        AuthError::EmailDelivery(_) | AuthError::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
        AuthError::Database(_)
        | AuthError::Jwt(_)
        | AuthError::HashingFailed
        | AuthError::CryptoFailed => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.client_message(),
        }),
    )
}

/// The raw user-agent string is the device identity for trust decisions.
pub(super) fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Build the session cookie: `Path=/`, HTTP-only, secure, cross-site, and
/// expiring with the credential.
fn session_cookie(token: &str) -> Result<HeaderValue, header::InvalidHeaderValue> {
    let expires = (Utc::now() + Duration::hours(SESSION_TTL_HOURS))
        .format("%a, %d %b %Y %H:%M:%S GMT");
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; Expires={expires}; HttpOnly; Secure; SameSite=None"
    ))
}

/// Overwrite the cookie with an empty value and epoch expiry. Client-side
/// invalidation only; there is no server-side blacklist.
fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "token=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=None",
    )
}

fn with_session_cookie(status: StatusCode, token: &str, body: UserResponse) -> Response {
    let mut response = (status, Json(body)).into_response();
    // A signed JWT is always a valid header value; skip the cookie rather
    // than fail the whole response if that ever stops holding.
    if let Ok(cookie) = session_cookie(token) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

/// Register a new user account.
///
/// The registering device is pre-trusted and a session cookie is set
/// immediately. Returns `201 Created` with the public user fields and the
/// credential in the body.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterPayload>,
) -> Result<Response, ApiError> {
    let request = RegisterRequest {
        name: payload.name,
        email: payload.email,
        password: payload.password,
    };
    let agent = user_agent(&headers);

    match state.auth_manager.register(request, &agent).await {
        Ok((user, token)) => {
            let body = UserResponse::from_user(&user, Some(token.clone()));
            Ok(with_session_cookie(StatusCode::CREATED, &token, body))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// Authenticate with email and password.
///
/// A recognized device receives `200 OK` and the session cookie. An
/// unrecognized one receives `403` with a challenge notice: a six-digit code
/// has been issued and must be submitted via `login-with-code`.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginPayload>,
) -> Result<Response, ApiError> {
    let request = LoginRequest {
        email: payload.email,
        password: payload.password,
    };
    let agent = user_agent(&headers);

    match state.auth_manager.login(request, &agent).await {
        // Body deliberately omits the token on plain login.
        Ok((user, token)) => Ok(with_session_cookie(
            StatusCode::OK,
            &token,
            UserResponse::from_user(&user, None),
        )),
        Err(e) => Err(error_response(e)),
    }
}

/// Clear the session cookie.
pub async fn logout() -> Response {
    let mut response = (
        StatusCode::OK,
        Json(MessageResponse {
            message: "Successfully logged out".to_string(),
        }),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, clear_session_cookie());
    response
}

/// Probe whether the request carries a valid session. Never errors.
pub async fn login_status(State(state): State<AppState>, headers: HeaderMap) -> Json<bool> {
    let valid = middleware::cookie_value(&headers, SESSION_COOKIE)
        .map(|token| state.auth_manager.login_status(&token))
        .unwrap_or(false);
    Json(valid)
}

/// Email the pending login challenge code to the user.
pub async fn send_login_code(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state.auth_manager.send_login_code(&email).await {
        Ok(()) => Ok(Json(MessageResponse {
            message: format!("Access code sent to {email}"),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// Complete a device challenge with the emailed code.
///
/// On success the submitting device becomes permanently trusted and the
/// session cookie is set.
pub async fn login_with_code(
    State(state): State<AppState>,
    Path(email): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<LoginWithCodePayload>,
) -> Result<Response, ApiError> {
    let agent = user_agent(&headers);

    match state
        .auth_manager
        .login_with_code(&email, &payload.login_code, &agent)
        .await
    {
        Ok((user, token)) => {
            let body = UserResponse::from_user(&user, Some(token.clone()));
            Ok(with_session_cookie(StatusCode::OK, &token, body))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// Request an email-verification link for the logged-in user.
pub async fn send_verification_email(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state.auth_manager.request_email_verification(user.id).await {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Verification email sent".to_string(),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// Verify an email address with the raw token from the emailed link.
pub async fn verify_user(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state.auth_manager.verify_email(&token).await {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Account verification successful".to_string(),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// Request a password-reset link.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state.auth_manager.forgot_password(&payload.email).await {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Password reset email sent".to_string(),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// Set a new password with the raw token from the emailed link.
///
/// No session is issued; the caller logs in with the new password.
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state
        .auth_manager
        .reset_password(&token, &payload.password)
        .await
    {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Password reset successful, please login".to_string(),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// Rotate the password of the logged-in user.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state
        .auth_manager
        .change_password(user.id, &payload.old_password, &payload.password)
        .await
    {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Password changed successfully, please login".to_string(),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// Login through the configured third-party identity provider.
///
/// First sight of an email provisions a pre-verified account; both paths
/// set the session cookie and return `201 Created`.
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GoogleCallbackPayload>,
) -> Result<Response, ApiError> {
    let agent = user_agent(&headers);

    match state
        .auth_manager
        .login_with_identity(&payload.user_token, &agent)
        .await
    {
        Ok((user, token)) => {
            let body = UserResponse::from_user(&user, Some(token.clone()));
            Ok(with_session_cookie(StatusCode::CREATED, &token, body))
        }
        Err(e) => Err(error_response(e)),
    }
}
