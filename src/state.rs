// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Instant;

use crate::auth::{AuthGate, TokenIssuer};
use crate::users::UserDirectory;

/// Shared application state, built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<TokenIssuer>,
    pub gate: Arc<AuthGate>,
    pub users: Arc<UserDirectory>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(issuer: TokenIssuer, gate: AuthGate, users: UserDirectory) -> Self {
        Self {
            issuer: Arc::new(issuer),
            gate: Arc::new(gate),
            users: Arc::new(users),
            started_at: Instant::now(),
        }
    }
}
