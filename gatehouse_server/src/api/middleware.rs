//! Session and role gates.
//!
//! `require_session` authenticates the cookie and inserts the [`User`] into
//! request extensions; the role gates behind it only inspect that extension.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use gatehouse::auth::{AuthError, Role, User};

use super::AppState;
use super::auth::{ApiError, SESSION_COOKIE, error_response};

/// Pull a single cookie value out of the `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

/// Authenticate the session cookie and expose the user to downstream
/// handlers via request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = cookie_value(request.headers(), SESSION_COOKIE)
        .ok_or_else(|| error_response(AuthError::Unauthorized))?;

    let user = state
        .auth_manager
        .authenticate(&token)
        .await
        .map_err(error_response)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Admit admins only. Must run inside `require_session`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<User>() {
        Some(user) if user.role == Role::Admin => Ok(next.run(request).await),
        _ => Err(error_response(AuthError::Unauthorized)),
    }
}

/// Admit authors and admins. Must run inside `require_session`.
pub async fn require_author(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<User>() {
        Some(user) if matches!(user.role, Role::Author | Role::Admin) => {
            Ok(next.run(request).await)
        }
        _ => Err(error_response(AuthError::Unauthorized)),
    }
}

/// Admit only accounts that completed email verification. Must run inside
/// `require_session`.
pub async fn require_verified(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<User>() {
        Some(user) if user.is_verified => Ok(next.run(request).await),
        _ => Err(error_response(AuthError::Unauthorized)),
    }
}
