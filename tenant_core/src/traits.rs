//! Capability traits for the collaborators of the isolation layer

use async_trait::async_trait;
use errors::{AuditError, SessionSyncError, TenancyError};

use crate::types::{Membership, TenantFilter, TenantId, UserId, ViolationRecord};

/// Read access to tenant memberships.
///
/// Implementations only read; membership CRUD lives elsewhere.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Active memberships of `user_id`, revoked ones excluded, ordered by
    /// join time ascending.
    async fn active_memberships(&self, user_id: &UserId) -> Result<Vec<Membership>, Self::Error>;

    /// The principal's designated default tenant, if one is set.
    async fn default_tenant(&self, user_id: &UserId) -> Result<Option<TenantId>, Self::Error>;

    async fn is_member(&self, user_id: &UserId, tenant_id: &TenantId) -> Result<bool, Self::Error>;
}

/// Session-level tenant marker in the data store.
///
/// Both procedures are optional on the database side. Callers treat every
/// error as degradable.
#[async_trait]
pub trait SessionContextSync: Send + Sync {
    async fn set_tenant_context(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId
    ) -> Result<(), SessionSyncError>;

    async fn clear_tenant_context(&self) -> Result<(), SessionSyncError>;
}

/// Used when the data store exposes no session procedures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSessionSync;

#[async_trait]
impl SessionContextSync for NoopSessionSync {
    async fn set_tenant_context(
        &self,
        _tenant_id: &TenantId,
        _user_id: &UserId
    ) -> Result<(), SessionSyncError> {
        Ok(())
    }

    async fn clear_tenant_context(&self) -> Result<(), SessionSyncError> {
        Ok(())
    }
}

/// Write-only destination for violation records.
#[async_trait]
pub trait ViolationSink: Send + Sync {
    fn sink_name(&self) -> &'static str;

    async fn record(&self, violation: ViolationRecord) -> Result<(), AuditError>;
}

/// Capability interface of a tenant-scoped repository.
///
/// Every method names the tenant scope it runs under, so a wrapper can check
/// the scope before the call reaches storage.
#[async_trait]
pub trait TenantScopedRepository: Send + Sync {
    type Record: Send + Sync;
    type Error: From<TenancyError> + Send + Sync;

    fn resource_name(&self) -> &str;

    async fn list(&self, filter: &TenantFilter) -> Result<Vec<Self::Record>, Self::Error>;

    async fn get(&self, tenant_id: &TenantId, id: &str)
    -> Result<Option<Self::Record>, Self::Error>;

    async fn insert(&self, tenant_id: &TenantId, record: Self::Record) -> Result<(), Self::Error>;

    async fn delete(&self, tenant_id: &TenantId, id: &str) -> Result<bool, Self::Error>;
}
