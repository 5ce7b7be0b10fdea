//! HTTP boundary adapters (axum): tenant resolution, bearer authentication,
//! permission guards and error mapping. Routing is left to the embedding app.

pub mod authz;
pub mod context;
pub mod errors;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;

use tenantguard_auth::AuthenticationService;

pub use authz::{PermissionGuard, authorize, permission_guard};
pub use context::{PrincipalContext, RequestTenant};
pub use errors::{ApiError, auth_error_to_response, json_error};
pub use middleware::{
    AuthState, TENANT_HEADER, auth_middleware, optional_tenant_middleware, tenant_middleware,
};

/// Wrap `router` so every request needs `X-Tenant-ID` and a valid bearer
/// token. The tenant is resolved first so the token is checked against it.
pub fn protect(router: Router, service: Arc<AuthenticationService>) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(tenant_middleware))
            .layer(axum::middleware::from_fn_with_state(
                AuthState { service },
                auth_middleware,
            )),
    )
}
