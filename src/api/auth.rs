// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, login, token refresh and logout.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::{Auth, IssueError, Role, TokenPair},
    error::ApiError,
    state::AppState,
    users::{NewUser, UserProfile},
};

/// Request body for POST /api/auth/login
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username or email
    #[serde(alias = "username", alias = "email")]
    pub login: String,
    pub password: String,
}

/// Response for login.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// Request body for POST /api/auth/refresh
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<NewUser>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    // Self-registration never picks a tenant; only admins assign one
    let profile = state.users.register(request, Role::User, None).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = LoginResponse),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .users
        .verify_credentials(&request.login, &request.password)
        .await?;
    let tokens = state.issuer.issue_pair(&user.identity()).await?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse { user, tokens }))
}

/// Trade a refresh token for a new pair.
///
/// The identity comes from the refresh token itself; the user must still
/// exist, and the new pair carries the user's current role.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, expired or already used")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let claims = state.issuer.inspect_refresh(&request.refresh_token)?;
    let user = state
        .users
        .get(&claims.sub)
        .await
        .ok_or(IssueError::RefreshTokenInvalid)?;

    let tokens = state
        .issuer
        .rotate(&user.identity(), &request.refresh_token)
        .await?;
    Ok(Json(tokens))
}

/// Revoke the caller's refresh token. The access token stays valid until
/// it expires.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Refresh token revoked"),
        (status = 401, description = "Unauthorized - invalid or missing token")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<StatusCode, ApiError> {
    state.issuer.revoke(&user.identity()).await?;
    Ok(StatusCode::NO_CONTENT)
}
