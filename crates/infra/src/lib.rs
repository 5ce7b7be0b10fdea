//! Infrastructure layer: in-memory collaborators and configuration loading
//! for the authentication service.

pub mod audit;
pub mod config;
pub mod rate_limit;
pub mod repository;
pub mod store;

use std::sync::Arc;

use tenantguard_auth::{AuthCollaborators, AuthConfig, Clock};

pub use audit::{RecordingAuditSink, TracingAuditSink};
pub use config::{ConfigError, load_auth_config, load_auth_config_from};
pub use rate_limit::{Budget, NoopRateLimiter, SlidingWindowRateLimiter};
pub use repository::{
    InMemoryChallengeRepository, InMemoryIdentityRepository, InMemoryRefreshTokenRepository,
    InMemoryRoleRepository,
};
pub use store::TenantTable;

/// In-memory wiring for tests and local development.
pub fn in_memory_collaborators(config: &AuthConfig, clock: Arc<dyn Clock>) -> AuthCollaborators {
    AuthCollaborators {
        identities: Arc::new(InMemoryIdentityRepository::new()),
        refresh_tokens: Arc::new(InMemoryRefreshTokenRepository::new()),
        challenges: Arc::new(InMemoryChallengeRepository::new()),
        rate_limiter: Arc::new(SlidingWindowRateLimiter::from_config(config, Arc::clone(&clock))),
        audit: Arc::new(TracingAuditSink),
        clock,
    }
}
