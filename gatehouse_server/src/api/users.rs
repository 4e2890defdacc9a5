//! Profile and admin endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use gatehouse::auth::{AuthError, ProfileUpdate, Role, User, UserId};
use serde::Deserialize;

use super::AppState;
use super::auth::{ApiError, MessageResponse, UserResponse, error_response};

#[derive(Debug, Deserialize)]
pub struct UpdateProfilePayload {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AutomatedEmailPayload {
    pub subject: String,
    pub send_to: String,
    pub reply_to: String,
    pub template: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRolePayload {
    pub role: String,
    pub id: UserId,
}

/// Current user's public profile.
pub async fn get_user(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(UserResponse::from_user(&user, None))
}

/// Update the current user's profile. Email and role are immutable here.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<UserResponse>, ApiError> {
    let update = ProfileUpdate {
        name: payload.name,
        phone: payload.phone,
        bio: payload.bio,
        photo: payload.photo,
    };

    match state.auth_manager.update_profile(user.id, update).await {
        Ok(updated) => Ok(Json(UserResponse::from_user(&updated, None))),
        Err(e) => Err(error_response(e)),
    }
}

/// Send a templated email to an arbitrary recipient, linking back into the
/// frontend.
pub async fn send_automated_email(
    State(state): State<AppState>,
    Json(payload): Json<AutomatedEmailPayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state
        .auth_manager
        .send_user_email(
            &payload.subject,
            &payload.send_to,
            &payload.reply_to,
            &payload.template,
            &payload.url,
        )
        .await
    {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Email sent".to_string(),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// Admin: list all users, newest first.
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    match state.auth_manager.list_users().await {
        Ok(users) => Ok(Json(
            users
                .iter()
                .map(|u| UserResponse::from_user(u, None))
                .collect(),
        )),
        Err(e) => Err(error_response(e)),
    }
}

/// Admin: hard-delete a user.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state.auth_manager.delete_user(id).await {
        Ok(()) => Ok(Json(MessageResponse {
            message: "User deleted successfully".to_string(),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// Admin: change a user's role.
pub async fn upgrade_user(
    State(state): State<AppState>,
    Json(payload): Json<UpgradeRolePayload>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Some(role) = Role::parse(&payload.role) else {
        return Err(error_response(AuthError::Validation(format!(
            "Unknown role: {}",
            payload.role
        ))));
    };

    match state.auth_manager.upgrade_role(payload.id, role).await {
        Ok(user) => Ok(Json(MessageResponse {
            message: format!("User role updated to {}", user.role.as_str()),
        })),
        Err(e) => Err(error_response(e)),
    }
}
