// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{
        middleware::{require_admin, require_auth},
        AuthenticatedUser, Role, TokenPair,
    },
    state::AppState,
    users::{NewUser, UserPage, UserProfile, UserUpdate},
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod users;

/// Build the HTTP router.
///
/// `require_auth` wraps everything, including the docs, so the public path
/// whitelist decides what is reachable anonymously. It sees full request
/// paths because it is layered outside the `/api` nest.
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/{user_id}", get(admin::get_user).delete(admin::delete_user))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .route(
            "/users/me",
            get(users::get_current_user).put(users::update_current_user),
        )
        .route("/health", get(health::health));

    Router::new()
        .nest("/api", api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        users::get_current_user,
        users::update_current_user,
        admin::list_users,
        admin::get_user,
        admin::create_user,
        admin::delete_user,
        health::health
    ),
    components(
        schemas(
            NewUser,
            UserUpdate,
            UserProfile,
            UserPage,
            Role,
            TokenPair,
            AuthenticatedUser,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::RefreshRequest,
            users::UserMeResponse,
            admin::CreateUserRequest,
            health::HealthResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Users", description = "Current user"),
        (name = "Admin", description = "User management for admins"),
        (name = "Health", description = "Liveness")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::state::test_support::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Method, Request, StatusCode},
        response::Response,
    };
    use chrono::Duration as ChronoDuration;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn request(
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register_and_login(app: &Router, username: &str) -> Value {
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "correct horse",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": "correct horse" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _clock) = test_state();
        let app = router(state);
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _clock) = test_state();
        let response = router(state)
            .oneshot(request(Method::GET, "/api/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["token_store"], "memory");
    }

    #[tokio::test]
    async fn login_needs_no_token_and_returns_a_pair() {
        let (state, _clock) = test_state();
        let app = router(state);
        let body = register_and_login(&app, "alice").await;
        assert_eq!(body["tokens"]["token_type"], "Bearer");
        assert_eq!(body["tokens"]["expires_in"], 900);
        assert_eq!(body["user"]["username"], "alice");
    }

    #[tokio::test]
    async fn wrong_password_is_401() {
        let (state, _clock) = test_state();
        let app = router(state);
        register_and_login(&app, "bob").await;
        let response = app
            .oneshot(request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": "bob", "password": "not the password" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn access_token_expires_after_fifteen_minutes() {
        let (state, clock) = test_state();
        let app = router(state);
        let body = register_and_login(&app, "carol").await;
        let access = body["tokens"]["access_token"].as_str().unwrap().to_string();

        clock.advance(ChronoDuration::minutes(14));
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/users/me", Some(&access), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let me = json_body(response).await;
        assert_eq!(me["profile"]["username"], "carol");

        clock.advance(ChronoDuration::minutes(2));
        let response = app
            .oneshot(request(Method::GET, "/api/users/me", Some(&access), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "invalid_token");
        assert_eq!(body["reason"], "expired");
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_replay() {
        let (state, clock) = test_state();
        let app = router(state);
        let body = register_and_login(&app, "dave").await;
        let refresh = body["tokens"]["refresh_token"].as_str().unwrap().to_string();

        clock.advance(ChronoDuration::minutes(20));
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({ "refresh_token": refresh })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let pair = json_body(response).await;
        let new_access = pair["access_token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/users/me", Some(&new_access), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({ "refresh_token": refresh })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_revokes_refresh_token() {
        let (state, _clock) = test_state();
        let app = router(state);
        let body = register_and_login(&app, "erin").await;
        let access = body["tokens"]["access_token"].as_str().unwrap().to_string();
        let refresh = body["tokens"]["refresh_token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/auth/logout", Some(&access), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({ "refresh_token": refresh })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Access tokens are not revocable
        let response = app
            .oneshot(request(Method::GET, "/api/users/me", Some(&access), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let (state, _clock) = test_state();
        let admin_token = state
            .issuer
            .issue_pair(&Identity::new("admin-1").with_role(Role::Admin))
            .await
            .unwrap()
            .access_token;
        let app = router(state);

        let body = register_and_login(&app, "frank").await;
        let user_token = body["tokens"]["access_token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/admin/users", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/admin/users", Some(&user_token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "insufficient_role");

        let response = app
            .oneshot(request(Method::GET, "/api/admin/users", Some(&admin_token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn admin_cannot_grant_super_admin() {
        let (state, _clock) = test_state();
        let admin_token = state
            .issuer
            .issue_pair(&Identity::new("admin-1").with_role(Role::Admin))
            .await
            .unwrap()
            .access_token;
        let app = router(state);

        let new_user = |role: &str| {
            json!({
                "username": format!("new-{role}"),
                "email": format!("new-{role}@example.com"),
                "password": "correct horse",
                "role": role,
            })
        };

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/admin/users",
                Some(&admin_token),
                Some(new_user("super_admin")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/admin/users",
                Some(&admin_token),
                Some(new_user("admin")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["role"], "admin");
    }

    #[tokio::test]
    async fn deleting_a_user_revokes_their_session() {
        let (state, _clock) = test_state();
        let admin_token = state
            .issuer
            .issue_pair(&Identity::new("admin-1").with_role(Role::SuperAdmin))
            .await
            .unwrap()
            .access_token;
        let app = router(state);

        let body = register_and_login(&app, "grace").await;
        let user_id = body["user"]["id"].as_str().unwrap().to_string();
        let refresh = body["tokens"]["refresh_token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(
                Method::DELETE,
                &format!("/api/admin/users/{user_id}"),
                Some(&admin_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/auth/refresh",
                None,
                Some(json!({ "refresh_token": refresh })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    async fn admin_token(state: &AppState) -> String {
        state
            .issuer
            .issue_pair(&Identity::new("admin-1").with_role(Role::Admin))
            .await
            .unwrap()
            .access_token
    }

    #[tokio::test]
    async fn admin_user_list_is_paginated() {
        let (state, _clock) = test_state();
        let token = admin_token(&state).await;
        let app = router(state);
        for name in ["hana", "ivan", "jude"] {
            register_and_login(&app, name).await;
        }

        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                "/api/admin/users?page=2&page_size=2",
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["page"], 2);
        assert_eq!(body["page_size"], 2);
        assert_eq!(body["total"], 3);
        assert_eq!(body["users"].as_array().unwrap().len(), 1);

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/admin/users?page=0&page_size=500",
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["page"], 1);
        assert_eq!(body["page_size"], 10);
        assert_eq!(body["users"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn admin_gets_user_by_id() {
        let (state, _clock) = test_state();
        let token = admin_token(&state).await;
        let app = router(state);
        let body = register_and_login(&app, "kim").await;
        let user_id = body["user"]["id"].as_str().unwrap().to_string();
        let user_token = body["tokens"]["access_token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                &format!("/api/admin/users/{user_id}"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["username"], "kim");

        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                &format!("/api/admin/users/{user_id}"),
                Some(&user_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request(Method::GET, "/api/admin/users/missing", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_updates_own_profile() {
        let (state, _clock) = test_state();
        let app = router(state);
        let body = register_and_login(&app, "lena").await;
        let access = body["tokens"]["access_token"].as_str().unwrap().to_string();
        let changes = json!({ "email": "lena.new@example.com", "full_name": "Lena Park" });

        let response = app
            .clone()
            .oneshot(request(Method::PUT, "/api/users/me", None, Some(changes.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(request(Method::PUT, "/api/users/me", Some(&access), Some(changes)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["email"], "lena.new@example.com");
        assert_eq!(body["full_name"], "Lena Park");

        let response = app
            .clone()
            .oneshot(request(
                Method::PUT,
                "/api/users/me",
                Some(&access),
                Some(json!({ "email": "not-an-email" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "lena.new@example.com", "password": "correct horse" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn only_admins_assign_tenants() {
        let (state, _clock) = test_state();
        let token = admin_token(&state).await;
        let app = router(state);

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "username": "mallory",
                    "email": "mallory@example.com",
                    "password": "correct horse",
                    "tenant_id": "someone-elses-org",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(json_body(response).await.get("tenant_id").is_none());

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/admin/users",
                Some(&token),
                Some(json!({
                    "username": "nadia",
                    "email": "nadia@example.com",
                    "password": "correct horse",
                    "tenant_id": "org_7",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["tenant_id"], "org_7");
        assert_eq!(body["role"], "user");
    }

    #[test]
    fn openapi_declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
