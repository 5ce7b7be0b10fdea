use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use tenantguard_auth::{AuthError, AuthenticationService, TenantContext, parse_tenant_id};

use crate::context::{PrincipalContext, RequestTenant};
use crate::errors::auth_error_to_response;

pub const TENANT_HEADER: &str = "x-tenant-id";

#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthenticationService>,
}

/// Require `X-Tenant-ID` and run the rest of the request inside that tenant.
pub async fn tenant_middleware(mut req: Request, next: Next) -> Response {
    let tenant_id = match tenant_from_headers(req.headers()) {
        Ok(Some(tenant_id)) => tenant_id,
        Ok(None) => return auth_error_to_response(AuthError::MissingTenant),
        Err(e) => return auth_error_to_response(e),
    };

    req.extensions_mut().insert(RequestTenant::new(tenant_id));
    TenantContext::scope(tenant_id, next.run(req)).await
}

/// Like [`tenant_middleware`], but a missing header is allowed (superuser
/// and tenant-less endpoints). A malformed header is still rejected.
pub async fn optional_tenant_middleware(mut req: Request, next: Next) -> Response {
    match tenant_from_headers(req.headers()) {
        Ok(Some(tenant_id)) => {
            req.extensions_mut().insert(RequestTenant::new(tenant_id));
            TenantContext::scope(tenant_id, next.run(req)).await
        }
        Ok(None) => next.run(req).await,
        Err(e) => auth_error_to_response(e),
    }
}

/// Verify the bearer access token and attach the principal.
pub async fn auth_middleware(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token.to_owned(),
        Err(e) => return auth_error_to_response(e),
    };

    let principal = match state.service.authenticate_access_token(&token).await {
        Ok(principal) => principal,
        Err(e) => return auth_error_to_response(e),
    };

    req.extensions_mut().insert(PrincipalContext::new(principal));
    next.run(req).await
}

fn tenant_from_headers(headers: &HeaderMap) -> Result<Option<tenantguard_core::TenantId>, AuthError> {
    let Some(value) = headers.get(TENANT_HEADER) else {
        return Ok(None);
    };
    let raw = value.to_str().map_err(|_| AuthError::InvalidTenant)?;
    parse_tenant_id(Some(raw)).map(Some)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::InvalidToken)?;

    let header = header.to_str().map_err(|_| AuthError::InvalidToken)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidToken)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }

    Ok(token)
}
