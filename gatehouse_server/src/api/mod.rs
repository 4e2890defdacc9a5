//! HTTP API for the account service.
//!
//! # Architecture
//!
//! - **Axum**: async web framework
//! - **Tower**: CORS and middleware layering
//! - **Cookie sessions**: a signed JWT in an HTTP-only `token` cookie
//!
//! # Modules
//!
//! - [`auth`]: credential flows (register, login, challenge codes, email
//!   verification, password reset, third-party login)
//! - [`users`]: profile and admin endpoints
//! - [`middleware`]: session and role gates for protected endpoints
//!
//! # Endpoints Overview
//!
//! ## Public
//! - `POST  /api/users/register` - Register and receive a session cookie
//! - `POST  /api/users/login` - Login (may demand a device challenge)
//! - `GET   /api/users/logout` - Clear the session cookie
//! - `GET   /api/users/login-status` - Probe the current session
//! - `GET   /api/users/send-login-code/{email}` - Email the pending code
//! - `POST  /api/users/login-with-code/{email}` - Complete a challenge
//! - `PATCH /api/users/verify-user/{token}` - Verify an email address
//! - `POST  /api/users/forgot-password` - Request a reset link
//! - `PUT   /api/users/reset-password/{token}` - Set a new password
//! - `POST  /api/users/google/callback` - Third-party identity login
//!
//! ## Session required
//! - `GET   /api/users/get-user` - Current profile
//! - `PATCH /api/users/update-user` - Update profile fields
//! - `PATCH /api/users/change-password` - Rotate the password
//! - `POST  /api/users/send-verification-email` - Request verification
//! - `POST  /api/users/send-automated-email` - Send a templated email
//!
//! ## Admin only
//! - `GET    /api/users` - List all users
//! - `DELETE /api/users/{id}` - Delete a user
//! - `POST   /api/users/upgrade-user` - Change a user's role

pub mod auth;
pub mod middleware;
pub mod users;

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json},
    routing::{delete, get, patch, post, put},
};
use gatehouse::auth::AuthManager;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; the manager is behind an `Arc` so this is cheap.
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let public_routes = Router::new()
        .route("/api/users/register", post(auth::register))
        .route("/api/users/login", post(auth::login))
        .route("/api/users/logout", get(auth::logout))
        .route("/api/users/login-status", get(auth::login_status))
        .route("/api/users/send-login-code/{email}", get(auth::send_login_code))
        .route("/api/users/login-with-code/{email}", post(auth::login_with_code))
        .route("/api/users/verify-user/{token}", patch(auth::verify_user))
        .route("/api/users/forgot-password", post(auth::forgot_password))
        .route("/api/users/reset-password/{token}", put(auth::reset_password))
        .route("/api/users/google/callback", post(auth::google_callback));

    let session_routes = Router::new()
        .route("/api/users/get-user", get(users::get_user))
        .route("/api/users/update-user", patch(users::update_user))
        .route("/api/users/change-password", patch(auth::change_password))
        .route(
            "/api/users/send-verification-email",
            post(auth::send_verification_email),
        )
        .route(
            "/api/users/send-automated-email",
            post(users::send_automated_email),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    let admin_routes = Router::new()
        .route("/api/users", get(users::list_users))
        .route("/api/users/{id}", delete(users::delete_user))
        .route("/api/users/upgrade-user", post(users::upgrade_user))
        .layer(axum::middleware::from_fn(middleware::require_admin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// CORS with credentials: cookies require explicit origins, never a wildcard.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Health check endpoint for monitoring and load balancers.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
