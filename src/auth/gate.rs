// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request authentication decisions.
//!
//! Per request the gate walks `whitelist → extract → verify`, and admin
//! routes add an `authorize` step. Each step either advances or rejects:
//!
//! | Step | Rejection | Status |
//! |------|-----------|--------|
//! | header must be `Bearer <token>` | `MissingOrMalformedHeader` | 401 |
//! | token must verify as an access token | `InvalidToken` | 401 |
//! | role must be in the admin policy | `InsufficientRole` | 403 |
//!
//! The gate is transport-agnostic; `middleware.rs` plugs it into axum.

use tracing::debug;

use super::claims::{AuthenticatedUser, TokenKind};
use super::codec::TokenCodec;
use super::error::AuthError;
use super::roles::RolePolicy;

/// How public-path entries are compared with request paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhitelistMode {
    /// Entry must match whole path segments: `/api/products` matches
    /// `/api/products` and `/api/products/7`, not `/api/products-admin`.
    #[default]
    Segment,
    /// Raw string prefix; `/api/products` also matches `/api/products-admin`.
    Prefix,
}

impl WhitelistMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "segment" => Some(WhitelistMode::Segment),
            "prefix" => Some(WhitelistMode::Prefix),
            _ => None,
        }
    }
}

/// Paths exempt from authentication.
#[derive(Debug, Clone, Default)]
pub struct PathWhitelist {
    entries: Vec<String>,
    mode: WhitelistMode,
}

impl PathWhitelist {
    pub fn new<I, S>(entries: I, mode: WhitelistMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(Into::<String>::into)
                .filter(|e| !e.is_empty())
                .collect(),
            mode,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn mode(&self) -> WhitelistMode {
        self.mode
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| match self.mode {
            WhitelistMode::Prefix => path.starts_with(entry.as_str()),
            WhitelistMode::Segment => segment_match(entry, path),
        })
    }
}

fn segment_match(entry: &str, path: &str) -> bool {
    match path.strip_prefix(entry) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || entry.ends_with('/'),
        None => false,
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Only the literal form `Bearer <token>` (exactly one space, non-empty
/// token) is accepted.
pub fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Authentication gate shared by every request.
#[derive(Clone)]
pub struct AuthGate {
    codec: TokenCodec,
    whitelist: PathWhitelist,
    admin_policy: RolePolicy,
}

impl AuthGate {
    pub fn new(codec: TokenCodec, whitelist: PathWhitelist, admin_policy: RolePolicy) -> Self {
        Self {
            codec,
            whitelist,
            admin_policy,
        }
    }

    pub fn whitelist(&self) -> &PathWhitelist {
        &self.whitelist
    }

    /// Decide whether a request may proceed.
    ///
    /// Returns `Ok(None)` for public paths (no identity attached, whatever
    /// the header says) and `Ok(Some(user))` once an access token verifies.
    pub fn authenticate(
        &self,
        path: &str,
        authorization: Option<&str>,
    ) -> Result<Option<AuthenticatedUser>, AuthError> {
        if self.whitelist.is_public(path) {
            return Ok(None);
        }

        let token = authorization
            .and_then(bearer_token)
            .ok_or(AuthError::MissingOrMalformedHeader)?;

        let claims = self
            .codec
            .verify_kind(token, TokenKind::Access)
            .map_err(|e| {
                debug!(path, reason = e.reason(), "Rejected bearer token");
                AuthError::InvalidToken(e)
            })?;

        Ok(Some(AuthenticatedUser::from_claims(claims)))
    }

    /// Admin-route check on an already authenticated user.
    pub fn authorize_admin(&self, user: &AuthenticatedUser) -> Result<(), AuthError> {
        if self.admin_policy.allows(user.role) {
            Ok(())
        } else {
            debug!(user_id = %user.user_id, role = ?user.role, "Admin access denied");
            Err(AuthError::InsufficientRole)
        }
    }
}
