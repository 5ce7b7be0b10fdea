//! Audit trail for authentication events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use tenantguard_core::{TenantId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Login,
    TwoFactorRequired,
    TwoFactorVerified,
    TwoFactorFailed,
    Refresh,
    Logout,
    Register,
    PasswordChanged,
    TwoFactorEnabled,
    TwoFactorDisabled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub actor_id: UserId,
    pub tenant_id: TenantId,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, actor_id: UserId, tenant_id: TenantId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            action,
            actor_id,
            tenant_id,
            metadata: serde_json::Value::Null,
            occurred_at,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("audit sink failed: {0}")]
pub struct AuditError(pub String);

/// Destination for audit events.
///
/// Recording is best effort: the service logs a failed write and carries on.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_event(&self, event: AuditEvent) -> Result<(), AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_serialize_as_constants() {
        let json = serde_json::to_value(AuditAction::TwoFactorVerified).unwrap();
        assert_eq!(json, "TWO_FACTOR_VERIFIED");
    }
}
