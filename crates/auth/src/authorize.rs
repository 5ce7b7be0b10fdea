//! Tenant-scoped RBAC decisions.

use std::sync::Arc;

use tenantguard_core::TenantId;

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::repository::RoleRepository;
use crate::tenant::TenantContext;

/// Answers "may this identity do `code` in this tenant?".
///
/// - superusers are allowed everywhere, with or without a tenant
/// - everyone else needs a tenant and a role *of that tenant* carrying the
///   exact permission code
///
/// Read-only and deterministic for a given role store state.
#[derive(Clone)]
pub struct PermissionResolver {
    roles: Arc<dyn RoleRepository>,
}

impl PermissionResolver {
    pub fn new(roles: Arc<dyn RoleRepository>) -> Self {
        Self { roles }
    }

    pub async fn has_permission(
        &self,
        identity: &Identity,
        tenant_id: Option<TenantId>,
        code: &str,
    ) -> AuthResult<bool> {
        if identity.is_superuser {
            return Ok(true);
        }
        let tenant_id = tenant_id.ok_or(AuthError::MissingTenant)?;

        let roles = self
            .roles
            .roles_for_user_in_tenant(identity.id, tenant_id)
            .await?;

        Ok(roles
            .iter()
            .filter(|role| role.tenant_id() == tenant_id)
            .any(|role| role.has(code)))
    }

    pub async fn require_permission(
        &self,
        code: &str,
        identity: &Identity,
        tenant_id: Option<TenantId>,
    ) -> AuthResult<()> {
        if self.has_permission(identity, tenant_id, code).await? {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    pub async fn has_permission_in_current_tenant(&self, identity: &Identity, code: &str) -> AuthResult<bool> {
        self.has_permission(identity, TenantContext::current(), code).await
    }

    pub async fn require_permission_in_current_tenant(&self, code: &str, identity: &Identity) -> AuthResult<()> {
        self.require_permission(code, identity, TenantContext::current())
            .await
    }
}
