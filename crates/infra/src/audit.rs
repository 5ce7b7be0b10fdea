//! Audit sinks.

use std::sync::Mutex;

use async_trait::async_trait;

use tenantguard_auth::{AuditAction, AuditError, AuditEvent, AuditSink};

/// Writes audit events to the `audit` tracing target.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_event(&self, event: AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            action = ?event.action,
            actor_id = %event.actor_id,
            tenant_id = %event.tenant_id,
            occurred_at = %event.occurred_at,
            metadata = %event.metadata,
            "audit event"
        );
        Ok(())
    }
}

/// Keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record_event(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .map_err(|_| AuditError("lock poisoned".into()))?
            .push(event);
        Ok(())
    }
}
