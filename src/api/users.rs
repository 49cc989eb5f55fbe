// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, AuthenticatedUser, Role};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::{UserProfile, UserUpdate};

/// Response for GET /api/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// User's unique ID (`sub` claim)
    pub user_id: String,
    /// Role carried by the access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Access token expiry (Unix timestamp)
    pub expires_at: i64,
    /// Directory record, if the user still exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl From<AuthenticatedUser> for UserMeResponse {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            user_id: user.user_id,
            role: user.role,
            tenant_id: user.tenant_id,
            expires_at: user.expires_at,
            profile: None,
        }
    }
}

/// Get the current authenticated user's information.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Json<UserMeResponse> {
    let profile = state.users.get(&user.user_id).await;
    let mut response = UserMeResponse::from(user);
    response.profile = profile;
    Json(response)
}

/// Update the current user's email or full name.
#[utoipa::path(
    put,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer" = [])),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "User no longer exists"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_current_user(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(changes): Json<UserUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.users.update(&user.user_id, changes).await?;
    Ok(Json(profile))
}
