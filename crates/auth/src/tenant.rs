//! Ambient tenant context.
//!
//! The active tenant is bound to the current task for the duration of a
//! scope. Concurrent tasks never observe each other's tenant, and the binding
//! is gone as soon as the scope's future completes, errors, or is dropped.

use std::future::Future;
use std::str::FromStr;

use tenantguard_core::TenantId;

use crate::error::{AuthError, AuthResult};

tokio::task_local! {
    // `None` marks an explicitly unrestricted scope.
    static CURRENT_TENANT: Option<TenantId>;
}

/// Handle for reading and scoping the ambient tenant.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantContext;

impl TenantContext {
    /// Run `fut` with `tenant_id` as the ambient tenant.
    pub async fn scope<F>(tenant_id: TenantId, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT.scope(Some(tenant_id), fut).await
    }

    /// Synchronous variant of [`TenantContext::scope`].
    pub fn sync_scope<R>(tenant_id: TenantId, f: impl FnOnce() -> R) -> R {
        CURRENT_TENANT.sync_scope(Some(tenant_id), f)
    }

    /// Run `fut` with tenant filtering lifted, even inside a tenant scope.
    ///
    /// Only for lookups that are checked afterwards, such as resolving a
    /// superuser whose home tenant differs from the request tenant.
    pub async fn unrestricted<F>(fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT.scope(None, fut).await
    }

    /// The ambient tenant, if one is bound.
    pub fn current() -> Option<TenantId> {
        CURRENT_TENANT.try_with(|t| *t).ok().flatten()
    }

    /// The ambient tenant, or `MissingTenant`.
    pub fn require() -> AuthResult<TenantId> {
        Self::current().ok_or(AuthError::MissingTenant)
    }

    /// Whether a row owned by `tenant_id` may be seen from here.
    ///
    /// With no ambient tenant (background jobs, seeding) nothing is filtered;
    /// explicit tenant arguments still apply.
    pub fn permits(tenant_id: TenantId) -> bool {
        Self::current().is_none_or(|current| current == tenant_id)
    }
}

/// Parse a tenant identifier from an external source (header, form field).
pub fn parse_tenant_id(raw: Option<&str>) -> AuthResult<TenantId> {
    let raw = raw.map(str::trim).ok_or(AuthError::MissingTenant)?;
    if raw.is_empty() {
        return Err(AuthError::MissingTenant);
    }
    TenantId::from_str(raw).map_err(|_| AuthError::InvalidTenant)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn unset_outside_a_scope() {
        assert_eq!(TenantContext::current(), None);
        assert_eq!(TenantContext::require(), Err(AuthError::MissingTenant));
        assert!(TenantContext::permits(TenantId::new()));
    }

    #[tokio::test]
    async fn bound_inside_and_cleared_after() {
        let tenant = TenantId::new();
        let seen = TenantContext::scope(tenant, async { TenantContext::current() }).await;
        assert_eq!(seen, Some(tenant));
        assert_eq!(TenantContext::current(), None);
    }

    #[tokio::test]
    async fn cleared_after_error() {
        let tenant = TenantId::new();
        let result: Result<(), &str> = TenantContext::scope(tenant, async { Err("boom") }).await;
        assert!(result.is_err());
        assert_eq!(TenantContext::current(), None);
    }

    #[tokio::test]
    async fn cleared_when_the_scope_is_cancelled() {
        let tenant = TenantId::new();
        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            TenantContext::scope(tenant, std::future::pending::<()>()),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(TenantContext::current(), None);
    }

    #[tokio::test]
    async fn nested_scope_restores_outer_tenant() {
        let outer = TenantId::new();
        let inner = TenantId::new();
        TenantContext::scope(outer, async move {
            let seen = TenantContext::scope(inner, async { TenantContext::current() }).await;
            assert_eq!(seen, Some(inner));
            assert_eq!(TenantContext::current(), Some(outer));
        })
        .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_tasks_are_isolated() {
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let tenant = TenantId::new();
                tokio::spawn(TenantContext::scope(tenant, async move {
                    for _ in 0..10 {
                        tokio::task::yield_now().await;
                        assert_eq!(TenantContext::current(), Some(tenant));
                    }
                    tenant
                }))
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[test]
    fn sync_scope_binds_for_the_closure() {
        let tenant = TenantId::new();
        let seen = TenantContext::sync_scope(tenant, TenantContext::current);
        assert_eq!(seen, Some(tenant));
        assert_eq!(TenantContext::current(), None);
    }

    #[test]
    fn permits_only_the_bound_tenant() {
        let tenant = TenantId::new();
        TenantContext::sync_scope(tenant, || {
            assert!(TenantContext::permits(tenant));
            assert!(!TenantContext::permits(TenantId::new()));
        });
    }

    #[tokio::test]
    async fn unrestricted_lifts_and_then_restores_the_tenant() {
        let tenant = TenantId::new();
        let other = TenantId::new();
        TenantContext::scope(tenant, async move {
            let inside = TenantContext::unrestricted(async move {
                (TenantContext::current(), TenantContext::permits(other))
            })
            .await;
            assert_eq!(inside, (None, true));
            assert_eq!(TenantContext::current(), Some(tenant));
            assert!(!TenantContext::permits(other));
        })
        .await;
    }

    #[test]
    fn parses_tenant_header_values() {
        let tenant = TenantId::new();
        assert_eq!(parse_tenant_id(Some(&tenant.to_string())), Ok(tenant));
        assert_eq!(parse_tenant_id(None), Err(AuthError::MissingTenant));
        assert_eq!(parse_tenant_id(Some("  ")), Err(AuthError::MissingTenant));
        assert_eq!(parse_tenant_id(Some("not-a-uuid")), Err(AuthError::InvalidTenant));
    }
}
