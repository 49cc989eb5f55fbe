// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory user directory.
//!
//! Owns password hashing and credential checks and hands the token layer an
//! [`Identity`] once a login succeeds. Records live only as long as the
//! process.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Identity, Role};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("username or email is already registered")]
    AlreadyExists,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("user not found")]
    NotFound,
    #[error("{0}")]
    InvalidInput(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Stored user record. The password hash never leaves this module.
#[derive(Debug, Clone)]
struct UserRecord {
    id: String,
    username: String,
    email: String,
    full_name: Option<String>,
    password_hash: String,
    role: Role,
    tenant_id: Option<String>,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Identity to embed into tokens for this user.
    pub fn identity(&self) -> Identity {
        Identity {
            subject: self.id.clone(),
            role: Some(self.role),
            tenant_id: self.tenant_id.clone(),
        }
    }
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
            full_name: record.full_name.clone(),
            role: record.role,
            tenant_id: record.tenant_id.clone(),
            is_active: record.is_active,
            last_login: record.last_login,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Registration input. Tenant and role are never taken from here; only the
/// admin create path assigns them.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Profile changes a user may make. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// One page of users, oldest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserPage {
    pub users: Vec<UserProfile>,
    pub page: u32,
    pub page_size: u32,
    pub total: usize,
}

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

const FULL_NAME_LEN: std::ops::RangeInclusive<usize> = 2..=100;

pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

#[derive(Default)]
struct Records {
    by_id: HashMap<String, UserRecord>,
}

impl Records {
    fn find_login(&self, login: &str) -> Option<&UserRecord> {
        let login = login.trim().to_lowercase();
        self.by_id
            .values()
            .find(|u| u.username.to_lowercase() == login || u.email == login)
    }

    fn taken(&self, username: &str, email: &str) -> bool {
        let username = username.to_lowercase();
        self.by_id
            .values()
            .any(|u| u.username.to_lowercase() == username || u.email == email)
    }

    fn email_taken_by_other(&self, id: &str, email: &str) -> bool {
        self.by_id.values().any(|u| u.id != id && u.email == email)
    }
}

/// Clamp a requested page: pages start at 1, and a size outside
/// `1..=MAX_PAGE_SIZE` falls back to [`DEFAULT_PAGE_SIZE`].
pub fn clamp_page(page: Option<i64>, page_size: Option<i64>) -> (u32, u32) {
    let page = page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
    let page_size = match page_size {
        Some(size) if (1..=MAX_PAGE_SIZE as i64).contains(&size) => size as u32,
        _ => DEFAULT_PAGE_SIZE,
    };
    (page, page_size)
}

fn normalize_email(email: &str) -> Result<String, UserError> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(UserError::InvalidInput("email is invalid".to_string()));
    }
    Ok(email)
}

fn normalize_full_name(full_name: &str) -> Result<String, UserError> {
    let full_name = full_name.trim().to_string();
    if !FULL_NAME_LEN.contains(&full_name.chars().count()) {
        return Err(UserError::InvalidInput(format!(
            "full_name must be {} to {} characters",
            FULL_NAME_LEN.start(),
            FULL_NAME_LEN.end()
        )));
    }
    Ok(full_name)
}

pub struct UserDirectory {
    records: RwLock<Records>,
    bcrypt_cost: u32,
}

impl UserDirectory {
    pub fn new(bcrypt_cost: u32) -> Self {
        Self {
            records: RwLock::new(Records::default()),
            bcrypt_cost,
        }
    }

    /// Create a user with the given role and tenant.
    pub async fn register(
        &self,
        new_user: NewUser,
        role: Role,
        tenant_id: Option<String>,
    ) -> Result<UserProfile, UserError> {
        let username = new_user.username.trim().to_string();
        if username.is_empty() {
            return Err(UserError::InvalidInput("username is required".to_string()));
        }
        let email = normalize_email(&new_user.email)?;
        let full_name = new_user
            .full_name
            .as_deref()
            .map(normalize_full_name)
            .transpose()?;
        if new_user.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.records.read().await.taken(&username, &email) {
            return Err(UserError::AlreadyExists);
        }

        let password_hash = hash_password(new_user.password, self.bcrypt_cost).await?;

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            full_name,
            password_hash,
            role,
            tenant_id,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        let mut records = self.records.write().await;
        // Re-check under the write lock; hashing ran without it
        if records.taken(&record.username, &record.email) {
            return Err(UserError::AlreadyExists);
        }
        let profile = UserProfile::from(&record);
        records.by_id.insert(record.id.clone(), record);

        info!(user_id = %profile.id, role = %profile.role, "Registered user");
        Ok(profile)
    }

    /// Check a username-or-email and password, recording the login time.
    pub async fn verify_credentials(
        &self,
        login: &str,
        password: &str,
    ) -> Result<UserProfile, UserError> {
        let (id, hash) = {
            let records = self.records.read().await;
            let record = records
                .find_login(login)
                .filter(|u| u.is_active)
                .ok_or(UserError::InvalidCredentials)?;
            (record.id.clone(), record.password_hash.clone())
        };

        if !verify_password(password.to_string(), hash).await? {
            return Err(UserError::InvalidCredentials);
        }

        let mut records = self.records.write().await;
        let record = records
            .by_id
            .get_mut(&id)
            .ok_or(UserError::InvalidCredentials)?;
        record.last_login = Some(Utc::now());
        Ok(UserProfile::from(&*record))
    }

    /// Seed a super admin unless a user with this email already exists.
    ///
    /// The username is the local part of the email.
    pub async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, UserError> {
        let email = email.trim().to_lowercase();
        if let Some(existing) = self.records.read().await.find_login(&email) {
            return Ok(UserProfile::from(existing));
        }

        let username = email.split('@').next().unwrap_or_default().to_string();
        self.register(
            NewUser {
                username,
                email,
                password: password.to_string(),
                full_name: None,
            },
            Role::SuperAdmin,
            None,
        )
        .await
    }

    pub async fn get(&self, id: &str) -> Option<UserProfile> {
        self.records.read().await.by_id.get(id).map(UserProfile::from)
    }

    /// One page of users, oldest first. Arguments are clamped with
    /// [`clamp_page`]; a page past the end is empty.
    pub async fn page(&self, page: Option<i64>, page_size: Option<i64>) -> UserPage {
        let (page, page_size) = clamp_page(page, page_size);
        let records = self.records.read().await;
        let mut all: Vec<&UserRecord> = records.by_id.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let offset = (page as usize - 1).saturating_mul(page_size as usize);
        let users = all
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .map(UserProfile::from)
            .collect();

        UserPage {
            users,
            page,
            page_size,
            total: records.by_id.len(),
        }
    }

    /// Apply profile changes. A new email must be free.
    pub async fn update(&self, id: &str, changes: UserUpdate) -> Result<UserProfile, UserError> {
        let email = changes.email.as_deref().map(normalize_email).transpose()?;
        let full_name = changes
            .full_name
            .as_deref()
            .map(normalize_full_name)
            .transpose()?;

        let mut records = self.records.write().await;
        if let Some(email) = &email {
            if records.email_taken_by_other(id, email) {
                return Err(UserError::AlreadyExists);
            }
        }
        let record = records.by_id.get_mut(id).ok_or(UserError::NotFound)?;
        if let Some(email) = email {
            record.email = email;
        }
        if let Some(full_name) = full_name {
            record.full_name = Some(full_name);
        }
        record.updated_at = Utc::now();

        info!(user_id = %record.id, "Updated user profile");
        Ok(UserProfile::from(&*record))
    }

    pub async fn remove(&self, id: &str) -> Result<UserProfile, UserError> {
        let mut records = self.records.write().await;
        let record = records.by_id.remove(id).ok_or(UserError::NotFound)?;
        info!(user_id = %record.id, "Removed user");
        Ok(UserProfile::from(&record))
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }
}

async fn hash_password(password: String, cost: u32) -> Result<String, UserError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| UserError::Hashing(e.to_string()))?
        .map_err(|e| UserError::Hashing(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> Result<bool, UserError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| UserError::Hashing(e.to_string()))?
        .map_err(|e| UserError::Hashing(e.to_string()))
}
