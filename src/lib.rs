// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token Gate - JWT access/refresh token service
//!
//! Issues short-lived HS256 access tokens with 7-day single-use refresh
//! tokens, keeps only salted digests of refresh tokens server side, and
//! guards the HTTP API with a bearer-token gate.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token codec, refresh store, issuer and request gate
//! - `config` - Environment configuration
//! - `users` - In-memory user directory with bcrypt password hashes

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;
pub mod users;

use std::sync::Arc;

use tracing::info;

use auth::{
    AuthGate, Clock, MemoryTokenStore, PathWhitelist, RedbTokenStore, RolePolicy, StoreError,
    StoreSweeper, SystemClock, TokenCodec, TokenIssuer, TokenStore,
};
use config::{AppConfig, ConfigError};
use state::AppState;
use users::{UserDirectory, UserError, DEFAULT_BCRYPT_COST};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to open token store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to seed admin user: {0}")]
    Bootstrap(#[from] UserError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything `main` needs to serve: shared state plus the background sweeper.
pub struct App {
    pub state: AppState,
    pub sweeper: StoreSweeper,
}

/// Wire the token store, codec, issuer, gate and user directory from config.
pub async fn build_app(config: &AppConfig) -> Result<App, StartupError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store: Arc<dyn TokenStore> = match &config.token_store_path {
        Some(path) => Arc::new(RedbTokenStore::open(path)?.with_timeout(config.store_timeout)),
        None => Arc::new(MemoryTokenStore::new().with_timeout(config.store_timeout)),
    };
    info!(
        backend = store.backend(),
        timeout_ms = config.store_timeout.as_millis() as u64,
        "Refresh token store ready"
    );

    let codec = TokenCodec::new(&config.jwt_secret, config.issuer.clone(), clock.clone());
    let issuer = TokenIssuer::new(codec.clone(), store.clone(), config.access_ttl);
    let gate = AuthGate::new(
        codec,
        PathWhitelist::new(config.public_paths.iter().cloned(), config.whitelist_mode),
        RolePolicy::new(config.admin_roles.iter().copied()),
    );
    info!(
        public_paths = gate.whitelist().entries().len(),
        mode = ?gate.whitelist().mode(),
        admin_roles = ?config.admin_roles,
        "Auth gate ready"
    );

    let users = UserDirectory::new(DEFAULT_BCRYPT_COST);
    if let Some(admin) = &config.bootstrap_admin {
        let profile = users.ensure_admin(&admin.email, &admin.password).await?;
        info!(user_id = %profile.id, "Bootstrap admin ready");
    }

    let sweeper = StoreSweeper::new(store, clock).with_interval(config.sweep_interval);

    Ok(App {
        state: AppState::new(issuer, gate, users),
        sweeper,
    })
}
