// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! `require_auth` wraps the whole router: it asks the [`AuthGate`] about each
//! request and, when a token verifies, inserts the [`AuthenticatedUser`] into
//! request extensions for the `Auth` extractor. `require_admin` is layered on
//! the admin subtree only.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .nest(
//!         "/api/admin",
//!         admin_routes.route_layer(from_fn_with_state(state.clone(), require_admin)),
//!     )
//!     .layer(from_fn_with_state(state.clone(), require_auth));
//! ```
//!
//! [`AuthGate`]: super::AuthGate

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Gate every request through whitelist, header and token checks.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    // A header that is not visible ASCII cannot be a bearer token; pass an
    // empty value so the gate rejects it like any other malformed header.
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default().to_string());

    match state.gate.authenticate(&path, header.as_deref()) {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Reject callers whose role is outside the admin policy.
///
/// Must run after [`require_auth`]; a request without an authenticated user
/// is treated as unauthenticated.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user) = request.extensions().get::<AuthenticatedUser>() else {
        return AuthError::MissingOrMalformedHeader.into_response();
    };

    match state.gate.authorize_admin(user) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
