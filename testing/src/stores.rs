use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tenant_core::{Membership, MembershipStore, TenantId, UserId};

use crate::{days_ago, tenant, user};

#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("Membership store unavailable")]
    Unavailable
}

/// Membership store backed by a vector, with switchable failure.
#[derive(Default)]
pub struct InMemoryMembershipStore {
    rows: RwLock<Vec<Membership>>,
    defaults: RwLock<HashMap<UserId, TenantId>>,
    failing: AtomicBool,
    lookups: AtomicUsize
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_membership(&self, user_id: &str, tenant_id: &str, role: &str, joined_days_ago: i64) {
        self.rows.write().push(Membership {
            tenant_id: tenant(tenant_id),
            user_id: user(user_id),
            role: role.to_string(),
            joined_at: days_ago(joined_days_ago),
            left_at: None
        });
    }

    pub fn revoke(&self, user_id: &str, tenant_id: &str) {
        let (user_id, tenant_id) = (user(user_id), tenant(tenant_id));
        for row in self.rows.write().iter_mut() {
            if row.user_id == user_id && row.tenant_id == tenant_id && row.left_at.is_none() {
                row.left_at = Some(Utc::now());
            }
        }
    }

    pub fn set_default_tenant(&self, user_id: &str, tenant_id: &str) {
        self.defaults.write().insert(user(user_id), tenant(tenant_id));
    }

    /// Every later lookup fails with [`MemoryStoreError::Unavailable`].
    pub fn fail_lookups(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn begin_lookup(&self) -> Result<(), MemoryStoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MemoryStoreError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    type Error = MemoryStoreError;

    async fn active_memberships(&self, user_id: &UserId) -> Result<Vec<Membership>, Self::Error> {
        self.begin_lookup()?;
        let mut rows: Vec<Membership> = self
            .rows
            .read()
            .iter()
            .filter(|m| &m.user_id == user_id && m.is_active())
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.joined_at);
        Ok(rows)
    }

    async fn default_tenant(&self, user_id: &UserId) -> Result<Option<TenantId>, Self::Error> {
        self.begin_lookup()?;
        Ok(self.defaults.read().get(user_id).cloned())
    }

    async fn is_member(&self, user_id: &UserId, tenant_id: &TenantId) -> Result<bool, Self::Error> {
        self.begin_lookup()?;
        Ok(self
            .rows
            .read()
            .iter()
            .any(|m| &m.user_id == user_id && &m.tenant_id == tenant_id && m.is_active()))
    }
}
