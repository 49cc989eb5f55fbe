// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Why a token failed to sign or verify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Structure could not be parsed (segments, base64, JSON, claims)
    #[error("token is malformed")]
    Malformed,
    /// MAC does not match (tampered or signed with another key)
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token issuer is not accepted")]
    WrongIssuer,
    /// Refresh token presented where an access token is required, or vice versa
    #[error("expected {expected} token")]
    WrongKind { expected: super::claims::TokenKind },
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Short machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::Expired => "expired",
            TokenError::WrongIssuer => "wrong_issuer",
            TokenError::WrongKind { .. } => "wrong_token_type",
            TokenError::Signing(_) => "signing_failed",
        }
    }
}

/// Refresh-token store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("token store error: {0}")]
    Backend(String),
}

/// Token pair issuance and rotation failures.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    /// Internal signing or storage fault; nothing was issued
    #[error("token issuance failed: {0}")]
    IssuanceFailed(String),
    /// Unknown, mismatched, expired or already-rotated refresh token
    #[error("refresh token is invalid")]
    RefreshTokenInvalid,
}

impl From<StoreError> for IssueError {
    fn from(e: StoreError) -> Self {
        IssueError::IssuanceFailed(e.to_string())
    }
}

/// Request rejection produced by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header, or not of the form `Bearer <token>`
    MissingOrMalformedHeader,
    /// Token failed verification
    InvalidToken(TokenError),
    /// Verified identity lacks an allowed role
    InsufficientRole,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingOrMalformedHeader => "missing_or_malformed_header",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::InsufficientRole => "insufficient_role",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingOrMalformedHeader | AuthError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingOrMalformedHeader => write!(
                f,
                "Authorization header is missing or malformed (expected 'Bearer <token>')"
            ),
            AuthError::InvalidToken(_) => write!(f, "Invalid or expired token"),
            AuthError::InsufficientRole => write!(f, "Admin access required"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = match &self {
            AuthError::InvalidToken(e) => Some(e.reason().to_string()),
            _ => None,
        };
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
            reason,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_header_returns_401() {
        let response = AuthError::MissingOrMalformedHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_or_malformed_header");
        assert!(body.get("reason").is_none());
    }

    #[tokio::test]
    async fn invalid_token_carries_reason() {
        let response = AuthError::InvalidToken(TokenError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "invalid_token");
        assert_eq!(body["reason"], "expired");
    }

    #[tokio::test]
    async fn insufficient_role_returns_403() {
        let response = AuthError::InsufficientRole.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn store_errors_become_issuance_failures() {
        let err: IssueError = StoreError::Timeout(Duration::from_millis(5)).into();
        assert!(matches!(err, IssueError::IssuanceFailed(_)));
    }
}
