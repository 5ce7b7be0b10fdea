use async_trait::async_trait;

use tenantguard_auth::{Identity, IdentityRepository, RepositoryError, RepositoryResult};
use tenantguard_core::{TenantId, UserId};

use crate::store::TenantTable;

/// Identities keyed by `(tenant, user id)`.
///
/// Username and email are unique per tenant, case-insensitively. Soft-deleted
/// rows are kept but invisible to identifier lookups.
#[derive(Debug, Default)]
pub struct InMemoryIdentityRepository {
    rows: TenantTable<UserId, Identity>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, tenant_id: TenantId) -> RepositoryResult<Vec<Identity>> {
        self.rows.list(tenant_id)
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn find_by_identifier_in_tenant(
        &self,
        identifier: &str,
        tenant_id: TenantId,
    ) -> RepositoryResult<Option<Identity>> {
        self.rows
            .find(tenant_id, |i| !i.is_deleted && i.matches_identifier(identifier))
    }

    async fn find_by_id(&self, user_id: UserId) -> RepositoryResult<Option<Identity>> {
        self.rows.find_by_key(&user_id)
    }

    async fn save(&self, identity: &Identity) -> RepositoryResult<()> {
        if self.rows.owned_elsewhere(identity.tenant_id, &identity.id)? {
            return Err(RepositoryError::TenantMismatch);
        }

        self.rows.upsert_checked(
            identity.tenant_id,
            identity.id,
            identity.clone(),
            |_, other| {
                if other.is_deleted {
                    return Ok(());
                }
                if other.username.eq_ignore_ascii_case(&identity.username) {
                    return Err(RepositoryError::Conflict("username already taken".into()));
                }
                if other.email.eq_ignore_ascii_case(&identity.email) {
                    return Err(RepositoryError::Conflict("email already taken".into()));
                }
                Ok(())
            },
        )
    }
}
