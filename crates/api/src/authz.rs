//! Permission checks at the HTTP boundary.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use tenantguard_auth::{AuthError, AuthResult, PermissionCode, PermissionResolver, TenantContext};

use crate::context::{PrincipalContext, RequestTenant};
use crate::errors::auth_error_to_response;

/// Route-level requirement: the caller must hold `code` in the request tenant.
///
/// Install with `axum::middleware::from_fn_with_state(guard, permission_guard)`
/// inside `auth_middleware`.
#[derive(Clone)]
pub struct PermissionGuard {
    resolver: PermissionResolver,
    code: PermissionCode,
}

impl PermissionGuard {
    pub fn new(resolver: PermissionResolver, code: PermissionCode) -> Self {
        Self { resolver, code }
    }
}

pub async fn permission_guard(State(guard): State<PermissionGuard>, req: Request, next: Next) -> Response {
    let Some(principal) = req.extensions().get::<PrincipalContext>().cloned() else {
        return auth_error_to_response(AuthError::InvalidToken);
    };
    let tenant_id = req
        .extensions()
        .get::<RequestTenant>()
        .map(RequestTenant::tenant_id);

    match authorize(&guard.resolver, &principal, tenant_id, &guard.code).await {
        Ok(()) => next.run(req).await,
        Err(e) => auth_error_to_response(e),
    }
}

/// Check a permission for handlers that decide dynamically.
///
/// Falls back to the ambient tenant when `tenant_id` is `None`.
pub async fn authorize(
    resolver: &PermissionResolver,
    principal: &PrincipalContext,
    tenant_id: Option<tenantguard_core::TenantId>,
    code: &PermissionCode,
) -> AuthResult<()> {
    let tenant_id = tenant_id.or_else(TenantContext::current);
    resolver
        .require_permission(code.as_str(), principal.principal().identity(), tenant_id)
        .await
}
