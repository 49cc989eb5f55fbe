// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access/refresh token pair issuance, rotation and revocation.
//!
//! ## Rotation
//!
//! A refresh token is single use. `rotate` checks the presented token
//! against the store and then issues a whole new pair; storing the new
//! refresh digest overwrites the old one, so replaying the old token fails.
//!
//! Access tokens are stateless and cannot be revoked before they expire.
//!
//! ## Store failures
//!
//! Store calls are bounded by the store itself (see [`TokenStore`]). A failed
//! `put` leaves the previous refresh token in place, so a rotation that fails
//! can be retried with the same token.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::claims::{Claims, Identity, TokenKind};
use super::codec::TokenCodec;
use super::error::{IssueError, TokenError};
use super::store::TokenStore;

/// Refresh tokens live for seven days.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Token pair handed to clients on login and refresh.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry
    pub expires_at: DateTime<Utc>,
    /// Seconds until the access token expires
    pub expires_in: i64,
    /// Always `Bearer`
    pub token_type: String,
}

/// Issues, rotates and revokes token pairs.
pub struct TokenIssuer {
    codec: TokenCodec,
    store: Arc<dyn TokenStore>,
    access_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(codec: TokenCodec, store: Arc<dyn TokenStore>, access_ttl: Duration) -> Self {
        Self {
            codec,
            store,
            access_ttl,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Sign a new access/refresh pair for `identity` and record the refresh
    /// token. Nothing is returned unless every step succeeds.
    pub async fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, IssueError> {
        let access = self
            .codec
            .sign(identity, TokenKind::Access, self.access_ttl)
            .map_err(|e| self.issuance_failed(identity, "access", e))?;

        let refresh = self
            .codec
            .sign(identity, TokenKind::Refresh, REFRESH_TOKEN_TTL)
            .map_err(|e| self.issuance_failed(identity, "refresh", e))?;

        self.store
            .put(&identity.subject, &refresh.token, refresh.claims.exp)
            .await
            .map_err(|e| {
                warn!(subject = %identity.subject, error = %e, "Failed to store refresh token");
                IssueError::from(e)
            })?;

        let expires_at = DateTime::from_timestamp(access.claims.exp, 0).unwrap_or_default();
        debug!(subject = %identity.subject, expires_at = %expires_at, "Issued token pair");

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_at,
            expires_in: access.claims.exp - access.claims.iat,
            token_type: "Bearer".to_string(),
        })
    }

    /// Exchange a valid refresh token for a new pair, retiring the old one.
    pub async fn rotate(
        &self,
        identity: &Identity,
        presented_refresh: &str,
    ) -> Result<TokenPair, IssueError> {
        let claims = self.inspect_refresh(presented_refresh)?;
        if claims.sub != identity.subject {
            debug!(subject = %identity.subject, "Refresh token subject mismatch");
            return Err(IssueError::RefreshTokenInvalid);
        }

        let now = self.codec.clock().unix_now();
        let known = self
            .store
            .verify(&identity.subject, presented_refresh, now)
            .await?;
        if !known {
            info!(subject = %identity.subject, "Rejected unknown or rotated refresh token");
            return Err(IssueError::RefreshTokenInvalid);
        }

        self.issue_pair(identity).await
    }

    /// Drop the refresh credential for `identity`. Idempotent.
    pub async fn revoke(&self, identity: &Identity) -> Result<(), IssueError> {
        self.store.invalidate(&identity.subject).await?;
        info!(subject = %identity.subject, "Revoked refresh token");
        Ok(())
    }

    /// Decode a presented refresh token without consulting the store.
    ///
    /// Any verification failure, or an access token in its place, is
    /// reported as [`IssueError::RefreshTokenInvalid`].
    pub fn inspect_refresh(&self, token: &str) -> Result<Claims, IssueError> {
        self.codec
            .verify_kind(token, TokenKind::Refresh)
            .map_err(|e| {
                debug!(reason = e.reason(), "Refresh token failed verification");
                IssueError::RefreshTokenInvalid
            })
    }

    fn issuance_failed(&self, identity: &Identity, which: &str, e: TokenError) -> IssueError {
        warn!(subject = %identity.subject, token = which, error = %e, "Failed to sign token");
        IssueError::IssuanceFailed(e.to_string())
    }
}
