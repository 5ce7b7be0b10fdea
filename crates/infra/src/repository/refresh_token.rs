use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tenantguard_auth::{
    RefreshTokenRecord, RefreshTokenRepository, RepositoryError, RepositoryResult, TenantContext,
};
use tenantguard_core::{RecordId, UserId};

/// Refresh token records. Rotation happens under a single write lock.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenRepository {
    records: RwLock<HashMap<RecordId, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, HashMap<RecordId, RefreshTokenRecord>>> {
        self.records
            .write()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".into()))
    }

    fn check_insert(
        records: &HashMap<RecordId, RefreshTokenRecord>,
        record: &RefreshTokenRecord,
    ) -> RepositoryResult<()> {
        if !TenantContext::permits(record.tenant_id) {
            return Err(RepositoryError::TenantMismatch);
        }
        if records.contains_key(&record.id)
            || records
                .values()
                .any(|r| r.token_fingerprint == record.token_fingerprint)
        {
            return Err(RepositoryError::Conflict("refresh token already stored".into()));
        }
        Ok(())
    }

    /// Records still usable at `now` for `user_id`.
    pub fn active_for_user(&self, user_id: UserId, now: DateTime<Utc>) -> RepositoryResult<usize> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".into()))?;
        Ok(records
            .values()
            .filter(|r| r.user_id == user_id && r.is_usable(now))
            .count())
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn find_valid(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<RefreshTokenRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".into()))?;
        Ok(records
            .values()
            .find(|r| {
                r.token_fingerprint == fingerprint
                    && r.is_usable(now)
                    && TenantContext::permits(r.tenant_id)
            })
            .cloned())
    }

    async fn insert(&self, record: RefreshTokenRecord) -> RepositoryResult<()> {
        let mut records = self.write()?;
        Self::check_insert(&records, &record)?;
        records.insert(record.id, record);
        Ok(())
    }

    async fn revoke(&self, id: RecordId) -> RepositoryResult<()> {
        if let Some(record) = self
            .write()?
            .get_mut(&id)
            .filter(|r| TenantContext::permits(r.tenant_id))
        {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<bool> {
        let mut records = self.write()?;
        match records
            .values_mut()
            .find(|r| r.token_fingerprint == fingerprint && TenantContext::permits(r.tenant_id))
        {
            Some(record) => {
                record.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> RepositoryResult<usize> {
        let mut records = self.write()?;
        let mut revoked = 0;
        for record in records
            .values_mut()
            .filter(|r| r.user_id == user_id && !r.revoked && TenantContext::permits(r.tenant_id))
        {
            record.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn rotate(&self, old_id: RecordId, replacement: RefreshTokenRecord) -> RepositoryResult<bool> {
        let mut records = self.write()?;

        match records.get(&old_id) {
            Some(old) if !old.revoked && TenantContext::permits(old.tenant_id) => {}
            _ => return Ok(false),
        }
        Self::check_insert(&records, &replacement)?;

        if let Some(old) = records.get_mut(&old_id) {
            old.revoked = true;
        }
        records.insert(replacement.id, replacement);
        Ok(true)
    }
}
