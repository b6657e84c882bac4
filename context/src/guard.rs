//! Interception wrappers that refuse to reach a tenant-scoped resource
//! without a live context.

use std::future::Future;

use async_trait::async_trait;
use errors::TenancyError;
use metrics::counter;
use tenant_core::{TenantContext, TenantFilter, TenantId, TenantScopedRepository};
use tracing::warn;

use crate::manager::ContextManager;

fn require_context<'m>(
    manager: &'m ContextManager,
    resource: &str,
    operation: &str
) -> Result<&'m TenantContext, TenancyError> {
    manager.context().ok_or_else(|| {
        counter!(
            "tenant_guard_rejections_total",
            "resource" => resource.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
        warn!(resource, operation, "Blocked call without tenant context");
        TenancyError::context_required(resource, operation)
    })
}

/// Generic guard around any resource.
///
/// The inner resource is only reachable through [`AccessGuard::call`] and
/// [`AccessGuard::call_async`], which both check for a context first.
pub struct AccessGuard<'m, R> {
    manager: &'m ContextManager,
    resource_name: String,
    inner: R
}

impl<'m, R> AccessGuard<'m, R> {
    pub fn new(manager: &'m ContextManager, resource_name: impl Into<String>, inner: R) -> Self {
        Self {
            manager,
            resource_name: resource_name.into(),
            inner
        }
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn manager(&self) -> &'m ContextManager {
        self.manager
    }

    /// Runs `f` against the inner resource once a context is present.
    pub fn call<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&R, &TenantContext) -> T
    ) -> Result<T, TenancyError> {
        let context = require_context(self.manager, &self.resource_name, operation)?;
        Ok(f(&self.inner, context))
    }

    /// Async form of [`AccessGuard::call`]. `f` is not invoked, and its future
    /// never created, without a context.
    pub async fn call_async<'a, T, F, Fut>(
        &'a self,
        operation: &str,
        f: F
    ) -> Result<T, TenancyError>
    where
        F: FnOnce(&'a R, &'a TenantContext) -> Fut,
        Fut: Future<Output = T>
    {
        let context = require_context(self.manager, &self.resource_name, operation)?;
        Ok(f(&self.inner, context).await)
    }
}

/// Repository wrapper with the same capability interface as the wrapped one.
///
/// Every method needs a context. Methods that name a tenant are also
/// authorized against it, so denials reach the violation logger attached to
/// the manager.
pub struct GuardedRepository<'m, R: TenantScopedRepository> {
    manager: &'m ContextManager,
    inner: R
}

impl<'m, R: TenantScopedRepository> GuardedRepository<'m, R> {
    pub fn new(manager: &'m ContextManager, inner: R) -> Self {
        Self { manager, inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Lists records in the manager's own tenant scope.
    pub async fn list_scoped(&self) -> Result<Vec<R::Record>, R::Error> {
        let context = require_context(self.manager, self.inner.resource_name(), "list")?;
        self.inner.list(&context.tenant_filter()).await
    }

    fn authorize(&self, tenant_id: &TenantId, operation: &str) -> Result<(), TenancyError> {
        let resource = self.inner.resource_name();
        require_context(self.manager, resource, operation)?;
        self.manager.authorize(tenant_id, resource, operation)?;
        Ok(())
    }
}

#[async_trait]
impl<'m, R: TenantScopedRepository> TenantScopedRepository for GuardedRepository<'m, R> {
    type Record = R::Record;
    type Error = R::Error;

    fn resource_name(&self) -> &str {
        self.inner.resource_name()
    }

    async fn list(&self, filter: &TenantFilter) -> Result<Vec<Self::Record>, Self::Error> {
        let resource = self.inner.resource_name();
        require_context(self.manager, resource, "list")?;
        for tenant_id in filter.tenant_ids() {
            self.manager.authorize(tenant_id, resource, "list")?;
        }
        self.inner.list(filter).await
    }

    async fn get(
        &self,
        tenant_id: &TenantId,
        id: &str
    ) -> Result<Option<Self::Record>, Self::Error> {
        self.authorize(tenant_id, "get")?;
        self.inner.get(tenant_id, id).await
    }

    async fn insert(&self, tenant_id: &TenantId, record: Self::Record) -> Result<(), Self::Error> {
        self.authorize(tenant_id, "insert")?;
        self.inner.insert(tenant_id, record).await
    }

    async fn delete(&self, tenant_id: &TenantId, id: &str) -> Result<bool, Self::Error> {
        self.authorize(tenant_id, "delete")?;
        self.inner.delete(tenant_id, id).await
    }
}
