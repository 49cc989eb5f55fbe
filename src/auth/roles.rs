// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles and the admin role policy.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// ## Role Hierarchy
///
/// - `SuperAdmin` - Everything an admin can do
/// - `Admin` - Access to admin-gated routes
/// - `User` - Normal authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Normal authenticated user
    User,
    /// Administrative access
    Admin,
    /// Full administrative access
    SuperAdmin,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::SuperAdmin, _) => true,
            (Role::Admin, Role::Admin | Role::User) => true,
            (Role::User, Role::User) => true,
            _ => false,
        }
    }

    /// Parse role from string (case-insensitive, `-` and `_` both accepted).
    pub fn from_str(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "super_admin" | "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

impl Default for Role {
    /// Default role is User (least privilege for authenticated users).
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

/// The set of roles allowed through admin-gated routes.
///
/// Membership is exact: a role is either listed or it is not. Tokens that
/// carry no role never pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    allowed: HashSet<Role>,
}

impl RolePolicy {
    pub fn new(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Whether a (possibly absent) role is in the allowed set.
    pub fn allows(&self, role: Option<Role>) -> bool {
        role.is_some_and(|r| self.allowed.contains(&r))
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::new([Role::Admin, Role::SuperAdmin])
    }
}
