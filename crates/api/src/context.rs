use tenantguard_auth::Principal;
use tenantguard_core::TenantId;

/// Tenant named by the request's `X-Tenant-ID` header.
///
/// Inserted as a request extension by `tenant_middleware`; the same tenant is
/// bound as the ambient `TenantContext` while the request is handled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestTenant {
    tenant_id: TenantId,
}

impl RequestTenant {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// The authenticated caller (inserted by `auth_middleware`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
