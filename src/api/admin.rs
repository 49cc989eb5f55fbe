// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only user management.
//!
//! The whole subtree sits behind `require_admin`; handlers only add checks
//! that depend on the target, e.g. creating a role above the caller's own.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{Auth, Role},
    error::ApiError,
    state::AppState,
    users::{NewUser, UserPage, UserProfile},
};

/// Request body for POST /api/admin/users
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub user: NewUser,
    #[serde(default)]
    pub role: Role,
    /// Tenant written into the user's tokens
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Query parameters for the admin user list.
#[derive(Debug, Deserialize, IntoParams)]
pub struct UserListQuery {
    /// Page number, starting at 1 (default: 1)
    #[param(default = 1)]
    pub page: Option<i64>,
    /// Users per page, 1 to 100 (default: 10)
    #[param(default = 10)]
    pub page_size: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    params(UserListQuery),
    responses(
        (status = 200, description = "One page of users", body = UserPage),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Forbidden - admin role required")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Json<UserPage> {
    Json(state.users.page(query.page, query.page_size).await)
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{user_id}",
    tag = "Admin",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserProfile),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    state
        .users
        .get(&user_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user not found"))
}

/// Create a user with an explicit role. Callers cannot grant a role above
/// their own.
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 403, description = "Role above the caller's own"),
        (status = 409, description = "Username or email already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    if !caller.has_role(request.role) {
        return Err(ApiError::forbidden(format!(
            "cannot grant role {}",
            request.role
        )));
    }

    let profile = state
        .users
        .register(request.user, request.role, request.tenant_id)
        .await?;
    info!(
        admin = %caller.user_id,
        user_id = %profile.id,
        role = %profile.role,
        "Admin created user"
    );
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Delete a user and revoke their refresh token.
#[utoipa::path(
    delete,
    path = "/api/admin/users/{user_id}",
    tag = "Admin",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete yourself"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if caller.user_id == user_id {
        return Err(ApiError::bad_request("cannot delete your own account"));
    }

    let target = state
        .users
        .get(&user_id)
        .await
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    if !caller.has_role(target.role) {
        return Err(ApiError::forbidden("cannot delete a user with a higher role"));
    }

    let removed = state.users.remove(&user_id).await?;
    state.issuer.revoke(&removed.identity()).await?;

    info!(admin = %caller.user_id, user_id = %removed.id, "Admin deleted user");
    Ok(StatusCode::NO_CONTENT)
}
