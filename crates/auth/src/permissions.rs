use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tenantguard_core::{DomainError, DomainResult};

/// Permission code (e.g. `"read_user"`).
///
/// Codes are opaque strings matched exactly. There is no wildcard and no
/// hierarchy: `"read_user"` does not imply anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(Cow<'static, str>);

impl PermissionCode {
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub const fn from_static(code: &'static str) -> Self {
        Self(Cow::Borrowed(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub const CREATE_USER: Self = Self::from_static("create_user");
    pub const READ_USER: Self = Self::from_static("read_user");
    pub const UPDATE_USER: Self = Self::from_static("update_user");
    pub const DELETE_USER: Self = Self::from_static("delete_user");

    pub const CREATE_ROLE: Self = Self::from_static("create_role");
    pub const READ_ROLE: Self = Self::from_static("read_role");
    pub const UPDATE_ROLE: Self = Self::from_static("update_role");
    pub const DELETE_ROLE: Self = Self::from_static("delete_role");

    pub const CREATE_TENANT: Self = Self::from_static("create_tenant");
    pub const READ_TENANT: Self = Self::from_static("read_tenant");
    pub const UPDATE_TENANT: Self = Self::from_static("update_tenant");
    pub const DELETE_TENANT: Self = Self::from_static("delete_tenant");
}

impl core::fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for PermissionCode {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

/// Global (not tenant-scoped) catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub code: PermissionCode,
    pub name: Cow<'static, str>,
    pub description: Cow<'static, str>,
}

impl Permission {
    const fn builtin(code: PermissionCode, name: &'static str, description: &'static str) -> Self {
        Self {
            code,
            name: Cow::Borrowed(name),
            description: Cow::Borrowed(description),
        }
    }
}

const BUILTIN: [Permission; 12] = [
    Permission::builtin(PermissionCode::CREATE_USER, "Create User", "Create new users"),
    Permission::builtin(PermissionCode::READ_USER, "Read User", "View user information"),
    Permission::builtin(PermissionCode::UPDATE_USER, "Update User", "Update user information"),
    Permission::builtin(PermissionCode::DELETE_USER, "Delete User", "Delete users"),
    Permission::builtin(PermissionCode::CREATE_ROLE, "Create Role", "Create new roles"),
    Permission::builtin(PermissionCode::READ_ROLE, "Read Role", "View role information"),
    Permission::builtin(PermissionCode::UPDATE_ROLE, "Update Role", "Update role information"),
    Permission::builtin(PermissionCode::DELETE_ROLE, "Delete Role", "Delete roles"),
    Permission::builtin(PermissionCode::CREATE_TENANT, "Create Tenant", "Create new tenants"),
    Permission::builtin(PermissionCode::READ_TENANT, "Read Tenant", "View tenant information"),
    Permission::builtin(PermissionCode::UPDATE_TENANT, "Update Tenant", "Update tenant information"),
    Permission::builtin(PermissionCode::DELETE_TENANT, "Delete Tenant", "Delete tenants"),
];

/// The set of permission codes roles may be granted.
#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    entries: BTreeMap<PermissionCode, Permission>,
}

impl PermissionCatalog {
    /// The built-in user/role/tenant CRUD permissions.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|p| (p.code.clone(), p.clone()))
            .collect();
        Self { entries }
    }

    /// Add an application-defined permission. Codes are unique.
    pub fn register(&mut self, permission: Permission) -> DomainResult<()> {
        if permission.code.as_str().trim().is_empty() {
            return Err(DomainError::validation("permission code cannot be empty"));
        }
        if self.entries.contains_key(&permission.code) {
            return Err(DomainError::invariant(format!(
                "permission '{}' already exists",
                permission.code
            )));
        }
        self.entries.insert(permission.code.clone(), permission);
        Ok(())
    }

    pub fn contains(&self, code: &PermissionCode) -> bool {
        self.entries.contains_key(code)
    }

    pub fn get(&self, code: &PermissionCode) -> Option<&Permission> {
        self.entries.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
