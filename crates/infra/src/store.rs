//! Tenant-isolated in-memory table shared by the repository adapters.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tenantguard_auth::{RepositoryError, RepositoryResult, TenantContext};
use tenantguard_core::TenantId;

/// Rows keyed by `(tenant, key)`.
///
/// Reads never return a row of a tenant other than the ambient
/// [`TenantContext`] tenant (when one is bound), even if the caller asks for it.
#[derive(Debug)]
pub struct TenantTable<K, V> {
    rows: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> Default for TenantTable<K, V> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> TenantTable<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, HashMap<(TenantId, K), V>>> {
        self.rows
            .read()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".into()))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, HashMap<(TenantId, K), V>>> {
        self.rows
            .write()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".into()))
    }

    pub fn get(&self, tenant_id: TenantId, key: &K) -> RepositoryResult<Option<V>> {
        if !TenantContext::permits(tenant_id) {
            return Ok(None);
        }
        Ok(self.read()?.get(&(tenant_id, key.clone())).cloned())
    }

    /// First row of `tenant_id` matching `pred`.
    pub fn find(&self, tenant_id: TenantId, pred: impl Fn(&V) -> bool) -> RepositoryResult<Option<V>> {
        if !TenantContext::permits(tenant_id) {
            return Ok(None);
        }
        Ok(self
            .read()?
            .iter()
            .find(|((t, _), v)| *t == tenant_id && pred(v))
            .map(|(_, v)| v.clone()))
    }

    /// Row with `key` in whichever tenant holds it, if that tenant is visible.
    pub fn find_by_key(&self, key: &K) -> RepositoryResult<Option<V>> {
        Ok(self
            .read()?
            .iter()
            .find(|((t, k), _)| k == key && TenantContext::permits(*t))
            .map(|(_, v)| v.clone()))
    }

    pub fn list(&self, tenant_id: TenantId) -> RepositoryResult<Vec<V>> {
        if !TenantContext::permits(tenant_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .read()?
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, v)| v.clone())
            .collect())
    }

    /// Insert or replace, after `check` has seen the tenant's other rows
    /// under the same write lock.
    pub fn upsert_checked(
        &self,
        tenant_id: TenantId,
        key: K,
        value: V,
        check: impl Fn(&K, &V) -> RepositoryResult<()>,
    ) -> RepositoryResult<()> {
        if !TenantContext::permits(tenant_id) {
            return Err(RepositoryError::TenantMismatch);
        }
        let mut rows = self.write()?;
        for ((t, k), v) in rows.iter() {
            if *t == tenant_id && *k != key {
                check(k, v)?;
            }
        }
        rows.insert((tenant_id, key), value);
        Ok(())
    }

    pub fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> RepositoryResult<()> {
        self.upsert_checked(tenant_id, key, value, |_, _| Ok(()))
    }

    /// Whether `key` is already stored under a tenant other than `tenant_id`.
    pub fn owned_elsewhere(&self, tenant_id: TenantId, key: &K) -> RepositoryResult<bool> {
        Ok(self
            .read()?
            .keys()
            .any(|(t, k)| k == key && *t != tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_partitioned_by_tenant() {
        let table = TenantTable::<u32, &str>::new();
        let a = TenantId::new();
        let b = TenantId::new();
        table.upsert(a, 1, "a1").unwrap();
        table.upsert(b, 1, "b1").unwrap();

        assert_eq!(table.get(a, &1).unwrap(), Some("a1"));
        assert_eq!(table.get(b, &1).unwrap(), Some("b1"));
        assert_eq!(table.list(a).unwrap(), vec!["a1"]);
    }

    #[test]
    fn ambient_tenant_hides_foreign_rows() {
        let table = TenantTable::<u32, &str>::new();
        let a = TenantId::new();
        let b = TenantId::new();
        table.upsert(a, 1, "a1").unwrap();
        table.upsert(b, 2, "b2").unwrap();

        TenantContext::sync_scope(a, || {
            assert_eq!(table.get(b, &2).unwrap(), None);
            assert_eq!(table.find_by_key(&2).unwrap(), None);
            assert!(table.list(b).unwrap().is_empty());
            assert_eq!(table.find_by_key(&1).unwrap(), Some("a1"));
            assert_eq!(table.upsert(b, 3, "b3"), Err(RepositoryError::TenantMismatch));
        });
    }

    #[test]
    fn checked_upsert_sees_only_same_tenant_rows() {
        let table = TenantTable::<u32, &str>::new();
        let a = TenantId::new();
        let b = TenantId::new();
        table.upsert(a, 1, "taken").unwrap();

        let no_dupes = |_: &u32, v: &&str| {
            if *v == "taken" {
                Err(RepositoryError::Conflict("taken".into()))
            } else {
                Ok(())
            }
        };
        assert!(table.upsert_checked(a, 2, "taken", no_dupes).is_err());
        assert!(table.upsert_checked(b, 2, "taken", no_dupes).is_ok());
        // Re-saving the same key is not a conflict with itself.
        assert!(table.upsert_checked(a, 1, "taken", no_dupes).is_ok());
    }
}
