use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use tenantguard_core::{DomainError, DomainResult, RoleId, TenantId};

use crate::permissions::PermissionCode;

/// Tenant-scoped named bundle of permission codes.
///
/// The owning tenant is fixed at construction; there is no setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    tenant_id: TenantId,
    name: String,
    pub description: Option<String>,
    permissions: BTreeSet<PermissionCode>,
}

impl Role {
    pub fn new(tenant_id: TenantId, name: impl Into<String>) -> DomainResult<Self> {
        Self::with_id(RoleId::new(), tenant_id, name)
    }

    pub fn with_id(id: RoleId, tenant_id: TenantId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            name,
            description: None,
            permissions: BTreeSet::new(),
        })
    }

    pub fn id(&self) -> RoleId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permissions(&self) -> impl Iterator<Item = &PermissionCode> {
        self.permissions.iter()
    }

    /// Returns `true` if the permission was newly granted.
    pub fn grant(&mut self, code: PermissionCode) -> bool {
        self.permissions.insert(code)
    }

    pub fn revoke(&mut self, code: &PermissionCode) -> bool {
        self.permissions.remove(code)
    }

    /// Exact-match check.
    pub fn has(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p.as_str() == code)
    }
}
