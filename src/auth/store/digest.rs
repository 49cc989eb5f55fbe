// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Salted one-way digests of raw refresh tokens.
//!
//! Format: `v1$<salt>$<mac>` where `mac = HMAC-SHA256(key = salt, msg = token)`
//! and both parts are unpadded base64url. The raw token is never stored.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

use crate::auth::error::StoreError;

type HmacSha256 = Hmac<Sha256>;

const VERSION: &str = "v1";
const SALT_LEN: usize = 16;

/// Hash a raw refresh token with a fresh random salt.
pub fn digest(raw_token: &str) -> Result<String, StoreError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| StoreError::Backend("system RNG unavailable".to_string()))?;

    let mac = keyed(&salt)?.chain_update(raw_token.as_bytes()).finalize();

    Ok(format!(
        "{VERSION}${}${}",
        Base64UrlUnpadded::encode_string(&salt),
        Base64UrlUnpadded::encode_string(&mac.into_bytes())
    ))
}

/// Constant-time check of a raw token against a stored digest.
///
/// Unparsable digests never match.
pub fn matches(stored: &str, raw_token: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(VERSION), Some(salt), Some(mac)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (
        Base64UrlUnpadded::decode_vec(salt),
        Base64UrlUnpadded::decode_vec(mac),
    ) else {
        return false;
    };

    match keyed(&salt) {
        Ok(mac) => mac
            .chain_update(raw_token.as_bytes())
            .verify_slice(&expected)
            .is_ok(),
        Err(_) => false,
    }
}

fn keyed(salt: &[u8]) -> Result<HmacSha256, StoreError> {
    HmacSha256::new_from_slice(salt).map_err(|e| StoreError::Backend(e.to_string()))
}
