//! Attempt budgets for credential and second-factor checks.

use async_trait::async_trait;

use tenantguard_core::{TenantId, UserId};

/// What an attempt is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateLimitKey {
    /// Password attempts for one identifier in one tenant.
    Login {
        tenant_id: TenantId,
        identifier: String,
    },
    /// Second-factor attempts for one user.
    TwoFactor { tenant_id: TenantId, user_id: UserId },
}

impl RateLimitKey {
    pub fn login(tenant_id: TenantId, identifier: &str) -> Self {
        Self::Login {
            tenant_id,
            identifier: identifier.trim().to_lowercase(),
        }
    }

    pub fn two_factor(tenant_id: TenantId, user_id: UserId) -> Self {
        Self::TwoFactor { tenant_id, user_id }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

/// Counts attempts. `check` records one attempt and reports whether it is
/// within budget; `reset` clears the budget after a success.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &RateLimitKey) -> RateLimitDecision;

    async fn reset(&self, key: &RateLimitKey);
}
