// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Stateless HS256 access tokens paired with server-tracked refresh tokens.
//!
//! ## Token Flow
//!
//! 1. A login succeeds and the user directory hands over an [`Identity`]
//! 2. [`TokenIssuer::issue_pair`] signs a short-lived access token and a
//!    7-day refresh token, storing only a salted digest of the latter
//! 3. Clients send `Authorization: Bearer <access token>`; the
//!    [`AuthGate`] verifies signature, issuer, type and expiry
//! 4. On expiry, [`TokenIssuer::rotate`] trades the refresh token for a new
//!    pair; the old refresh token stops working immediately
//! 5. Logout calls [`TokenIssuer::revoke`]
//!
//! ## Security
//!
//! - Access tokens are not revocable; they live `JWT_EXPIRE_IN_SECS`
//! - At most one live refresh token per subject
//! - Refresh tokens are never stored in the clear
//! - Expiry is inclusive: a token is dead at `now >= exp`

pub mod claims;
pub mod clock;
pub mod codec;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod issuer;
pub mod middleware;
pub mod roles;
pub mod store;
pub mod sweeper;

pub use claims::{AuthenticatedUser, Claims, Identity, TokenKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{SignedToken, TokenCodec};
pub use error::{AuthError, IssueError, StoreError, TokenError};
pub use extractor::{AdminOnly, Auth};
pub use gate::{AuthGate, PathWhitelist, WhitelistMode};
pub use issuer::{TokenIssuer, TokenPair};
pub use roles::{Role, RolePolicy};
pub use store::{MemoryTokenStore, RedbTokenStore, TokenStore};
pub use sweeper::StoreSweeper;
