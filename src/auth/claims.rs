// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims, identities and the authenticated user attached to requests.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// The identity a token is issued for.
///
/// Supplied by the user directory after a successful credential check and
/// embedded unchanged into every token minted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Canonical subject (user ID)
    pub subject: String,
    pub role: Option<Role>,
    /// Organization / tenant the user belongs to
    pub tenant_id: Option<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            role: None,
            tenant_id: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims carried by every token this service signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,

    /// Unique token ID; keeps two tokens minted in the same second distinct
    pub jti: String,

    /// Access or refresh
    #[serde(rename = "typ")]
    pub kind: TokenKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Tenant ID
    #[serde(default, rename = "tid", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl Claims {
    /// Rebuild the identity embedded in these claims.
    pub fn identity(&self) -> Identity {
        Identity {
            subject: self.sub.clone(),
            role: self.role,
            tenant_id: self.tenant_id.clone(),
        }
    }
}

/// Authenticated user information extracted from a verified access token.
///
/// Inserted into request extensions by the auth gate and read by handlers
/// through the `Auth` extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Original issuer (not serialized)
    #[serde(skip)]
    pub issuer: String,

    /// Token expiration (Unix timestamp)
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Create from verified claims.
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            tenant_id: claims.tenant_id,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            subject: self.user_id.clone(),
            role: self.role,
            tenant_id: self.tenant_id.clone(),
        }
    }

    /// Check if the user has at least the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.is_some_and(|r| r.has_privilege(required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims() -> Claims {
        Claims {
            sub: "user_123".to_string(),
            iss: "token-gate".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_000_900,
            jti: "jti-1".to_string(),
            kind: TokenKind::Access,
            role: Some(Role::Admin),
            tenant_id: Some("org_9".to_string()),
        }
    }

    #[test]
    fn claims_use_compact_field_names() {
        let json = serde_json::to_value(sample_claims()).unwrap();
        assert_eq!(json["sub"], "user_123");
        assert_eq!(json["typ"], "access");
        assert_eq!(json["tid"], "org_9");
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn optional_claims_are_omitted_when_absent() {
        let mut claims = sample_claims();
        claims.role = None;
        claims.tenant_id = None;
        let json = serde_json::to_value(claims).unwrap();
        assert!(json.get("role").is_none());
        assert!(json.get("tid").is_none());
    }

    #[test]
    fn from_claims_carries_identity() {
        let user = AuthenticatedUser::from_claims(sample_claims());
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.role, Some(Role::Admin));
        assert_eq!(user.identity(), sample_claims().identity());
    }

    #[test]
    fn has_role_requires_a_role() {
        let mut claims = sample_claims();
        claims.role = None;
        let user = AuthenticatedUser::from_claims(claims);
        assert!(!user.has_role(Role::User));
    }
}
