//! Persistence contracts consumed by the authentication service.
//!
//! Implementations must scope every query to the tenant passed in (or bound
//! in [`crate::TenantContext`]) and make `rotate`/`consume` atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantguard_core::{RecordId, RoleId, TenantId, UserId};

use crate::identity::Identity;
use crate::roles::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found")]
    NotFound,

    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Persisted refresh token. Only the fingerprint of the token is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub token_fingerprint: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

/// Pre-auth ticket issued when login stops at the 2FA step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoFactorChallenge {
    pub id: RecordId,
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub ticket_fingerprint: String,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl TwoFactorChallenge {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && now < self.expires_at
    }
}

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Match `identifier` against username or email within `tenant_id`.
    async fn find_by_identifier_in_tenant(
        &self,
        identifier: &str,
        tenant_id: TenantId,
    ) -> RepositoryResult<Option<Identity>>;

    async fn find_by_id(&self, user_id: UserId) -> RepositoryResult<Option<Identity>>;

    /// Insert or update. Fails with `Conflict` when username or email is
    /// already taken by another identity of the same tenant.
    async fn save(&self, identity: &Identity) -> RepositoryResult<()>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// A record with this fingerprint that is neither revoked nor expired.
    async fn find_valid(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<RefreshTokenRecord>>;

    async fn insert(&self, record: RefreshTokenRecord) -> RepositoryResult<()>;

    /// Idempotent.
    async fn revoke(&self, id: RecordId) -> RepositoryResult<()>;

    /// Revoke the record with this fingerprint whether or not it has expired.
    /// Returns `false` when no such record exists.
    async fn revoke_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<bool>;

    /// Returns the number of records newly revoked.
    async fn revoke_all_for_user(&self, user_id: UserId) -> RepositoryResult<usize>;

    /// Revoke `old_id` and insert `replacement` as one atomic step.
    ///
    /// Returns `false` (and inserts nothing) if `old_id` was already revoked.
    async fn rotate(&self, old_id: RecordId, replacement: RefreshTokenRecord) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    async fn insert(&self, challenge: TwoFactorChallenge) -> RepositoryResult<()>;

    async fn find_valid(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<TwoFactorChallenge>>;

    /// Mark consumed. Returns `false` if someone else consumed it first.
    async fn consume(&self, id: RecordId) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn roles_for_user_in_tenant(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> RepositoryResult<Vec<Role>>;

    async fn save_role(&self, role: &Role) -> RepositoryResult<()>;

    /// Fails with `TenantMismatch` when the role belongs to another tenant
    /// than `tenant_id`.
    async fn assign_role(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> RepositoryResult<()>;
}
