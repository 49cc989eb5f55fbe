// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup; an invalid value aborts startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HMAC-SHA256 signing secret | Random per process (warns) |
//! | `JWT_ISSUER` | Issuer claim written and required | `token-gate` |
//! | `JWT_EXPIRE_IN_SECS` | Access token lifetime | `900` |
//! | `AUTH_PUBLIC_PATHS` | Comma-separated unauthenticated paths | See [`DEFAULT_PUBLIC_PATHS`] |
//! | `AUTH_WHITELIST_MODE` | `segment` or `prefix` path matching | `segment` |
//! | `AUTH_ADMIN_ROLES` | Comma-separated roles allowed on admin routes | `admin,super_admin` |
//! | `TOKEN_STORE_PATH` | redb file for refresh tokens | In-memory store |
//! | `STORE_TIMEOUT_MS` | Bound on each refresh store call | `2000` |
//! | `STORE_SWEEP_INTERVAL_SECS` | Expired refresh entry sweep interval | `300` |
//! | `BOOTSTRAP_ADMIN_EMAIL` | Seed a super admin with this email | Unset |
//! | `BOOTSTRAP_ADMIN_PASSWORD` | Password for the seeded super admin | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};

use crate::auth::{Role, WhitelistMode};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// HMAC signing secret. Tokens signed with one secret never verify under
/// another, so a random secret invalidates every session on restart.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const JWT_EXPIRE_ENV: &str = "JWT_EXPIRE_IN_SECS";

pub const PUBLIC_PATHS_ENV: &str = "AUTH_PUBLIC_PATHS";
pub const WHITELIST_MODE_ENV: &str = "AUTH_WHITELIST_MODE";
pub const ADMIN_ROLES_ENV: &str = "AUTH_ADMIN_ROLES";

/// Path of the redb refresh-token database. When unset, refresh tokens are
/// kept in memory and lost on restart.
pub const TOKEN_STORE_PATH_ENV: &str = "TOKEN_STORE_PATH";
pub const STORE_TIMEOUT_ENV: &str = "STORE_TIMEOUT_MS";
pub const SWEEP_INTERVAL_ENV: &str = "STORE_SWEEP_INTERVAL_SECS";

pub const BOOTSTRAP_ADMIN_EMAIL_ENV: &str = "BOOTSTRAP_ADMIN_EMAIL";
pub const BOOTSTRAP_ADMIN_PASSWORD_ENV: &str = "BOOTSTRAP_ADMIN_PASSWORD";

/// Logging format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_ISSUER: &str = "token-gate";
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 900;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Paths reachable without a bearer token.
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/api/auth/register",
    "/api/auth/login",
    "/api/auth/refresh",
    "/api/health",
    "/docs",
    "/api-doc",
];

/// Size of a generated signing secret.
const GENERATED_SECRET_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to generate signing secret")]
    SecretGeneration,
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Where the signing secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Environment,
    Generated,
}

/// Credentials for the seeded super admin.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Fully parsed startup configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: Vec<u8>,
    pub secret_source: SecretSource,
    pub issuer: String,
    pub access_ttl: Duration,
    pub public_paths: Vec<String>,
    pub whitelist_mode: WhitelistMode,
    pub admin_roles: Vec<Role>,
    pub token_store_path: Option<PathBuf>,
    pub store_timeout: Duration,
    pub sweep_interval: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("secret_source", &self.secret_source)
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("public_paths", &self.public_paths)
            .field("whitelist_mode", &self.whitelist_mode)
            .field("admin_roles", &self.admin_roles)
            .field("token_store_path", &self.token_store_path)
            .field("store_timeout", &self.store_timeout)
            .field("sweep_interval", &self.sweep_interval)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = var(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(var(PORT_ENV), PORT_ENV, 8080u16)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::invalid(HOST_ENV, &host, "not a bind address"))?;

        let (jwt_secret, secret_source) = match var(JWT_SECRET_ENV) {
            Some(secret) => (secret.into_bytes(), SecretSource::Environment),
            None => (generate_secret()?, SecretSource::Generated),
        };

        let issuer = var(JWT_ISSUER_ENV).unwrap_or_else(|| DEFAULT_ISSUER.to_string());

        let ttl_secs = parse_or(var(JWT_EXPIRE_ENV), JWT_EXPIRE_ENV, DEFAULT_ACCESS_TTL_SECS)?;
        if ttl_secs == 0 {
            return Err(ConfigError::invalid(JWT_EXPIRE_ENV, "0", "must be positive"));
        }

        let public_paths = match var(PUBLIC_PATHS_ENV) {
            Some(list) => split_list(&list),
            None => DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
        };
        if let Some(bad) = public_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::invalid(PUBLIC_PATHS_ENV, bad, "paths must start with '/'"));
        }

        let whitelist_mode = match var(WHITELIST_MODE_ENV) {
            Some(mode) => WhitelistMode::from_str(&mode).ok_or_else(|| {
                ConfigError::invalid(WHITELIST_MODE_ENV, &mode, "expected segment or prefix")
            })?,
            None => WhitelistMode::default(),
        };

        let admin_roles = match var(ADMIN_ROLES_ENV) {
            Some(list) => split_list(&list)
                .iter()
                .map(|r| {
                    Role::from_str(r)
                        .ok_or_else(|| ConfigError::invalid(ADMIN_ROLES_ENV, r, "unknown role"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![Role::Admin, Role::SuperAdmin],
        };
        if admin_roles.is_empty() {
            return Err(ConfigError::invalid(ADMIN_ROLES_ENV, "", "at least one role is required"));
        }

        let store_timeout_ms =
            parse_or(var(STORE_TIMEOUT_ENV), STORE_TIMEOUT_ENV, DEFAULT_STORE_TIMEOUT_MS)?;
        if store_timeout_ms == 0 {
            return Err(ConfigError::invalid(STORE_TIMEOUT_ENV, "0", "must be positive"));
        }
        let sweep_secs =
            parse_or(var(SWEEP_INTERVAL_ENV), SWEEP_INTERVAL_ENV, DEFAULT_SWEEP_INTERVAL_SECS)?;
        if sweep_secs == 0 {
            return Err(ConfigError::invalid(SWEEP_INTERVAL_ENV, "0", "must be positive"));
        }

        let bootstrap_email = var(BOOTSTRAP_ADMIN_EMAIL_ENV);
        let bootstrap_password = var(BOOTSTRAP_ADMIN_PASSWORD_ENV);
        let bootstrap_admin = match (bootstrap_email, bootstrap_password) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::invalid(
                    BOOTSTRAP_ADMIN_PASSWORD_ENV,
                    "",
                    "required when BOOTSTRAP_ADMIN_EMAIL is set",
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::invalid(
                    BOOTSTRAP_ADMIN_EMAIL_ENV,
                    "",
                    "required when BOOTSTRAP_ADMIN_PASSWORD is set",
                ))
            }
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            secret_source,
            issuer,
            access_ttl: Duration::from_secs(ttl_secs),
            public_paths,
            whitelist_mode,
            admin_roles,
            token_store_path: var(TOKEN_STORE_PATH_ENV).map(PathBuf::from),
            store_timeout: Duration::from_millis(store_timeout_ms),
            sweep_interval: Duration::from_secs(sweep_secs),
            bootstrap_admin,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::invalid(name, &v, "not a valid number")),
        None => Ok(default),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Random signing secret as base64url text, the same shape an operator would
/// put in `JWT_SECRET`.
fn generate_secret() -> Result<Vec<u8>, ConfigError> {
    let mut bytes = [0u8; GENERATED_SECRET_LEN];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| ConfigError::SecretGeneration)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes).into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.issuer, DEFAULT_ISSUER);
        assert_eq!(config.access_ttl, Duration::from_secs(900));
        assert_eq!(config.whitelist_mode, WhitelistMode::Segment);
        assert_eq!(config.admin_roles, vec![Role::Admin, Role::SuperAdmin]);
        assert!(config.public_paths.iter().any(|p| p == "/api/auth/login"));
        assert!(config.token_store_path.is_none());
        assert_eq!(config.store_timeout, Duration::from_millis(2000));
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn missing_secret_is_generated() {
        let a = load(&[]).unwrap();
        let b = load(&[]).unwrap();
        assert_eq!(a.secret_source, SecretSource::Generated);
        assert!(a.jwt_secret.len() >= GENERATED_SECRET_LEN);
        assert_ne!(a.jwt_secret, b.jwt_secret);
    }

    #[test]
    fn explicit_values_are_parsed() {
        let config = load(&[
            (JWT_SECRET_ENV, "s3cret"),
            (JWT_ISSUER_ENV, "shop"),
            (JWT_EXPIRE_ENV, "60"),
            (PUBLIC_PATHS_ENV, "/api/auth/login, /api/products"),
            (WHITELIST_MODE_ENV, "prefix"),
            (ADMIN_ROLES_ENV, "super_admin"),
            (TOKEN_STORE_PATH_ENV, "/tmp/tokens.redb"),
            (PORT_ENV, "9000"),
        ])
        .unwrap();
        assert_eq!(config.jwt_secret, b"s3cret");
        assert_eq!(config.secret_source, SecretSource::Environment);
        assert_eq!(config.issuer, "shop");
        assert_eq!(config.access_ttl, Duration::from_secs(60));
        assert_eq!(config.public_paths, vec!["/api/auth/login", "/api/products"]);
        assert_eq!(config.whitelist_mode, WhitelistMode::Prefix);
        assert_eq!(config.admin_roles, vec![Role::SuperAdmin]);
        assert_eq!(config.token_store_path, Some(PathBuf::from("/tmp/tokens.redb")));
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn invalid_values_fail() {
        assert!(load(&[(JWT_EXPIRE_ENV, "soon")]).is_err());
        assert!(load(&[(JWT_EXPIRE_ENV, "0")]).is_err());
        assert!(matches!(
            load(&[(STORE_TIMEOUT_ENV, "0")]),
            Err(ConfigError::Invalid { name: STORE_TIMEOUT_ENV, .. })
        ));
        assert!(load(&[(SWEEP_INTERVAL_ENV, "0")]).is_err());
        assert!(load(&[(WHITELIST_MODE_ENV, "regex")]).is_err());
        assert!(load(&[(ADMIN_ROLES_ENV, "admin,root")]).is_err());
        assert!(load(&[(PUBLIC_PATHS_ENV, "api/health")]).is_err());
        assert!(load(&[(BOOTSTRAP_ADMIN_EMAIL_ENV, "root@example.com")]).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = load(&[
            (JWT_SECRET_ENV, "very-secret-value"),
            (BOOTSTRAP_ADMIN_EMAIL_ENV, "root@example.com"),
            (BOOTSTRAP_ADMIN_PASSWORD_ENV, "hunter22-password"),
        ])
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret-value"));
        assert!(!rendered.contains("hunter22-password"));
        assert!(rendered.contains("root@example.com"));
    }
}
