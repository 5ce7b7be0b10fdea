use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tenantguard_auth::{
    ChallengeRepository, RepositoryError, RepositoryResult, TenantContext, TwoFactorChallenge,
};
use tenantguard_core::RecordId;

/// Pending 2FA tickets.
#[derive(Debug, Default)]
pub struct InMemoryChallengeRepository {
    challenges: RwLock<HashMap<RecordId, TwoFactorChallenge>>,
}

impl InMemoryChallengeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChallengeRepository for InMemoryChallengeRepository {
    async fn insert(&self, challenge: TwoFactorChallenge) -> RepositoryResult<()> {
        if !TenantContext::permits(challenge.tenant_id) {
            return Err(RepositoryError::TenantMismatch);
        }
        let mut challenges = self
            .challenges
            .write()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".into()))?;
        if challenges
            .values()
            .any(|c| c.ticket_fingerprint == challenge.ticket_fingerprint)
        {
            return Err(RepositoryError::Conflict("ticket already stored".into()));
        }
        challenges.insert(challenge.id, challenge);
        Ok(())
    }

    async fn find_valid(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<TwoFactorChallenge>> {
        let challenges = self
            .challenges
            .read()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".into()))?;
        Ok(challenges
            .values()
            .find(|c| {
                c.ticket_fingerprint == fingerprint
                    && c.is_usable(now)
                    && TenantContext::permits(c.tenant_id)
            })
            .cloned())
    }

    async fn consume(&self, id: RecordId) -> RepositoryResult<bool> {
        let mut challenges = self
            .challenges
            .write()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".into()))?;
        match challenges.get_mut(&id) {
            Some(c) if !c.consumed && TenantContext::permits(c.tenant_id) => {
                c.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tenantguard_core::{TenantId, UserId};

    use super::*;

    fn challenge(fp: &str, expires_at: DateTime<Utc>) -> TwoFactorChallenge {
        TwoFactorChallenge {
            id: RecordId::new(),
            user_id: UserId::new(),
            tenant_id: TenantId::new(),
            ticket_fingerprint: fp.into(),
            expires_at,
            consumed: false,
        }
    }

    #[tokio::test]
    async fn consumed_once() {
        let repo = InMemoryChallengeRepository::new();
        let c = challenge("fp", Utc::now() + Duration::minutes(5));
        repo.insert(c.clone()).await.unwrap();

        assert!(repo.find_valid("fp", Utc::now()).await.unwrap().is_some());
        assert!(repo.consume(c.id).await.unwrap());
        assert!(!repo.consume(c.id).await.unwrap());
        assert!(repo.find_valid("fp", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_ticket_is_not_valid() {
        let repo = InMemoryChallengeRepository::new();
        let expires = Utc::now() + Duration::minutes(5);
        repo.insert(challenge("fp", expires)).await.unwrap();

        assert!(repo.find_valid("fp", expires).await.unwrap().is_none());
    }
}
