use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use tenantguard_auth::{
    PermissionCatalog, RepositoryError, RepositoryResult, Role, RoleRepository, TenantContext,
};
use tenantguard_core::{RoleId, TenantId, UserId};

#[derive(Debug, Default)]
struct RoleState {
    roles: HashMap<RoleId, Role>,
    /// `(tenant, user, role)`
    assignments: HashSet<(TenantId, UserId, RoleId)>,
}

/// Roles and user↔role assignments.
///
/// - a role's tenant never changes once stored
/// - a role may only carry codes from the permission catalog
/// - a user can only be given a role of the tenant the assignment is for
#[derive(Debug)]
pub struct InMemoryRoleRepository {
    catalog: PermissionCatalog,
    state: RwLock<RoleState>,
}

impl Default for InMemoryRoleRepository {
    fn default() -> Self {
        Self::new(PermissionCatalog::builtin())
    }
}

impl InMemoryRoleRepository {
    pub fn new(catalog: PermissionCatalog) -> Self {
        Self {
            catalog,
            state: RwLock::new(RoleState::default()),
        }
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable("lock poisoned".into())
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn roles_for_user_in_tenant(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> RepositoryResult<Vec<Role>> {
        if !TenantContext::permits(tenant_id) {
            return Ok(Vec::new());
        }
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .assignments
            .iter()
            .filter(|(t, u, _)| *t == tenant_id && *u == user_id)
            .filter_map(|(_, _, role_id)| state.roles.get(role_id))
            .filter(|role| role.tenant_id() == tenant_id)
            .cloned()
            .collect())
    }

    async fn save_role(&self, role: &Role) -> RepositoryResult<()> {
        if !TenantContext::permits(role.tenant_id()) {
            return Err(RepositoryError::TenantMismatch);
        }
        if let Some(code) = role.permissions().find(|code| !self.catalog.contains(code)) {
            return Err(RepositoryError::Conflict(format!(
                "unknown permission code '{code}'"
            )));
        }

        let mut state = self.state.write().map_err(poisoned)?;
        if let Some(existing) = state.roles.get(&role.id()) {
            if existing.tenant_id() != role.tenant_id() {
                return Err(RepositoryError::TenantMismatch);
            }
        }
        state.roles.insert(role.id(), role.clone());
        Ok(())
    }

    async fn assign_role(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> RepositoryResult<()> {
        if !TenantContext::permits(tenant_id) {
            return Err(RepositoryError::TenantMismatch);
        }
        let mut state = self.state.write().map_err(poisoned)?;
        let role = state.roles.get(&role_id).ok_or(RepositoryError::NotFound)?;
        if role.tenant_id() != tenant_id {
            return Err(RepositoryError::TenantMismatch);
        }
        state.assignments.insert((tenant_id, user_id, role_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tenantguard_auth::PermissionCode;

    use super::*;

    #[tokio::test]
    async fn roles_are_returned_for_their_tenant_only() {
        let repo = InMemoryRoleRepository::default();
        let t1 = TenantId::new();
        let t2 = TenantId::new();
        let user = UserId::new();

        let mut reader = Role::new(t1, "reader").unwrap();
        reader.grant(PermissionCode::READ_USER);
        repo.save_role(&reader).await.unwrap();
        repo.assign_role(user, t1, reader.id()).await.unwrap();

        assert_eq!(repo.roles_for_user_in_tenant(user, t1).await.unwrap().len(), 1);
        assert!(repo.roles_for_user_in_tenant(user, t2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cross_tenant_assignment_is_refused() {
        let repo = InMemoryRoleRepository::default();
        let t1 = TenantId::new();
        let role = Role::new(t1, "admin").unwrap();
        repo.save_role(&role).await.unwrap();

        assert_eq!(
            repo.assign_role(UserId::new(), TenantId::new(), role.id()).await,
            Err(RepositoryError::TenantMismatch)
        );
    }

    #[tokio::test]
    async fn role_tenant_is_immutable() {
        let repo = InMemoryRoleRepository::default();
        let role = Role::new(TenantId::new(), "admin").unwrap();
        repo.save_role(&role).await.unwrap();

        let moved = Role::with_id(role.id(), TenantId::new(), "admin").unwrap();
        assert_eq!(repo.save_role(&moved).await, Err(RepositoryError::TenantMismatch));
    }

    #[tokio::test]
    async fn codes_outside_the_catalog_are_refused() {
        let repo = InMemoryRoleRepository::default();
        let mut role = Role::new(TenantId::new(), "weird").unwrap();
        role.grant(PermissionCode::new("launch_missiles"));

        assert!(matches!(
            repo.save_role(&role).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn unknown_role_cannot_be_assigned() {
        let repo = InMemoryRoleRepository::default();
        assert_eq!(
            repo.assign_role(UserId::new(), TenantId::new(), RoleId::new()).await,
            Err(RepositoryError::NotFound)
        );
    }
}
