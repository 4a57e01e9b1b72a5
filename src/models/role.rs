//! Role and permission domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Closed set of console user classes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
    Dispatcher,
    Fleet,
    Customer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Driver,
        Role::Dispatcher,
        Role::Fleet,
        Role::Customer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Driver => "driver",
            Role::Dispatcher => "dispatcher",
            Role::Fleet => "fleet",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role name returned by the authority
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "driver" => Ok(Role::Driver),
            "dispatcher" => Ok(Role::Dispatcher),
            "fleet" => Ok(Role::Fleet),
            "customer" => Ok(Role::Customer),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Row returned by `get_role_permissions()`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RolePermissionRow {
    pub role_name: String,
    pub permission_name: String,
}

/// Role → permission names, as published by the remote authority
#[derive(Debug, Clone, Serialize)]
pub struct RolePermissionMap {
    entries: HashMap<Role, BTreeSet<String>>,
    pub fetched_at: DateTime<Utc>,
}

impl RolePermissionMap {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Build the map from authority rows. Rows naming roles outside the
    /// closed enumeration are skipped.
    pub fn from_rows(rows: impl IntoIterator<Item = RolePermissionRow>) -> Self {
        let mut map = Self::new();
        for row in rows {
            match row.role_name.parse::<Role>() {
                Ok(role) => map.grant(role, row.permission_name),
                Err(e) => tracing::warn!(error = %e, "Skipping permission row"),
            }
        }
        map
    }

    pub fn grant(&mut self, role: Role, permission: impl Into<String>) {
        self.entries.entry(role).or_default().insert(permission.into());
    }

    pub fn contains(&self, role: Role, permission: &str) -> bool {
        self.entries
            .get(&role)
            .is_some_and(|set| set.contains(permission))
    }

    pub fn permissions_for(&self, role: Role) -> Vec<String> {
        self.entries
            .get(&role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeSet::is_empty)
    }
}

impl Default for RolePermissionMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Permission summary
#[derive(Debug, Serialize)]
pub struct PermissionSummary {
    pub role: Option<Role>,
    pub permissions: Vec<String>,
    pub is_admin: bool,
    pub is_driver: bool,
    pub is_dispatcher: bool,
    pub is_fleet: bool,
    pub is_customer: bool,
}

/// Update role request
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}
