//! Active memberships and primary tenant selection.

use std::collections::HashSet;
use std::sync::Arc;

use errors::ResolutionError;
use tenant_core::{Membership, MembershipStore, ResolvedMembership, TenantId, UserId};
use tracing::{debug, trace};

/// Reads a principal's memberships and marks the primary one.
pub struct MembershipResolver<M: MembershipStore> {
    store: Arc<M>
}

impl<M: MembershipStore> Clone for MembershipResolver<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store)
        }
    }
}

impl<M: MembershipStore> MembershipResolver<M> {
    pub fn new(store: Arc<M>) -> Self {
        Self { store }
    }

    /// Active memberships of `user_id`, earliest first.
    ///
    /// An empty list is not an error here; the caller decides what no
    /// memberships means. Store failures come back as
    /// [`ResolutionError::MembershipLookup`].
    pub async fn memberships(
        &self,
        user_id: &UserId
    ) -> Result<Vec<ResolvedMembership>, ResolutionError> {
        let rows = self
            .store
            .active_memberships(user_id)
            .await
            .map_err(lookup_failed)?;

        if rows.is_empty() {
            trace!(user_id = %user_id, "No active memberships");
            return Ok(Vec::new());
        }

        let default_tenant = self
            .store
            .default_tenant(user_id)
            .await
            .map_err(lookup_failed)?;

        let resolved = mark_primary(rows, default_tenant.as_ref());
        debug!(
            user_id = %user_id,
            count = resolved.len(),
            "Resolved memberships"
        );
        Ok(resolved)
    }

    /// Membership check for a single tenant.
    pub async fn is_member(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId
    ) -> Result<bool, ResolutionError> {
        self.store
            .is_member(user_id, tenant_id)
            .await
            .map_err(lookup_failed)
    }
}

fn lookup_failed<E: std::error::Error>(e: E) -> ResolutionError {
    ResolutionError::MembershipLookup {
        reason: e.to_string()
    }
}

/// Orders active memberships by join time and flags the primary one.
///
/// The primary membership is the designated default tenant when the
/// principal still belongs to it, otherwise the earliest joined. Revoked rows
/// and repeated tenants are dropped.
pub fn mark_primary(
    mut rows: Vec<Membership>,
    default_tenant: Option<&TenantId>
) -> Vec<ResolvedMembership> {
    rows.retain(Membership::is_active);
    rows.sort_by_key(|m| m.joined_at);

    let mut seen = HashSet::new();
    rows.retain(|m| seen.insert(m.tenant_id.clone()));

    let primary = default_tenant
        .filter(|d| rows.iter().any(|m| &m.tenant_id == *d))
        .or_else(|| rows.first().map(|m| &m.tenant_id))
        .cloned();

    rows.into_iter()
        .map(|m| ResolvedMembership {
            is_primary: primary.as_ref() == Some(&m.tenant_id),
            tenant_id: m.tenant_id,
            role: m.role
        })
        .collect()
}
