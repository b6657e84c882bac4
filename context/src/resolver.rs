//! Tenant context resolution.
//!
//! Turns an authenticated principal into a [`TenantContext`]:
//! 1. Active memberships (none → failure)
//! 2. Explicit tenant override, allowed for members of that tenant and admins
//! 3. Otherwise the primary membership
//! 4. Best-effort session marker in the data store
//! 5. Context over all membership tenants

use std::collections::BTreeSet;
use std::sync::Arc;

use config::IsolationConfig;
use errors::ResolutionError;
use tenant_core::{
    ContextOptions, MembershipStore, NoopSessionSync, Role, SessionContextSync, TenantContext,
    TenantId, UserId
};
use tracing::{debug, warn};

use crate::membership::MembershipResolver;

/// Outcome of [`ContextResolver::resolve_context`]. Resolution never panics;
/// every failure is a [`ResolutionError`].
pub type ResolutionResult = Result<TenantContext, ResolutionError>;

pub struct ContextResolver<M: MembershipStore> {
    memberships: MembershipResolver<M>,
    session: Arc<dyn SessionContextSync>,
    session_sync_enabled: bool,
    default_strict_mode: bool
}

impl<M: MembershipStore> ContextResolver<M> {
    /// Resolver with a no-op session marker, permissive by default.
    pub fn new(store: Arc<M>) -> Self {
        Self {
            memberships: MembershipResolver::new(store),
            session: Arc::new(NoopSessionSync),
            session_sync_enabled: true,
            default_strict_mode: false
        }
    }

    pub fn from_config(store: Arc<M>, config: &IsolationConfig) -> Self {
        Self {
            session_sync_enabled: config.session_sync_enabled,
            default_strict_mode: config.default_strict_mode,
            ..Self::new(store)
        }
    }

    /// Routes the session marker through `session`. Has no effect when
    /// session sync is disabled in the configuration.
    #[must_use]
    pub fn with_session_sync(mut self, session: Arc<dyn SessionContextSync>) -> Self {
        self.session = session;
        self
    }

    /// Strict mode used when the options leave it unset.
    #[must_use]
    pub fn with_default_strict_mode(mut self, strict: bool) -> Self {
        self.default_strict_mode = strict;
        self
    }

    pub fn memberships(&self) -> &MembershipResolver<M> {
        &self.memberships
    }

    /// Resolves the tenant context for `user_id` acting with `role`.
    pub async fn resolve_context(
        &self,
        user_id: &UserId,
        role: Role,
        options: &ContextOptions
    ) -> ResolutionResult {
        let memberships = self.memberships.memberships(user_id).await?;
        if memberships.is_empty() {
            warn!(user_id = %user_id, "Context resolution failed: no memberships");
            return Err(ResolutionError::NoMemberships {
                user_id: user_id.to_string()
            });
        }

        let accessible: BTreeSet<TenantId> =
            memberships.iter().map(|m| m.tenant_id.clone()).collect();

        let tenant_id = match &options.override_tenant_id {
            Some(requested) => {
                if !accessible.contains(requested) && !role.is_admin() {
                    warn!(
                        user_id = %user_id,
                        tenant_id = %requested,
                        "Context resolution failed: override not permitted"
                    );
                    return Err(ResolutionError::AccessDenied {
                        user_id: user_id.to_string(),
                        tenant_id: requested.to_string()
                    });
                }
                requested.clone()
            }
            None => memberships
                .iter()
                .find(|m| m.is_primary)
                .unwrap_or(&memberships[0])
                .tenant_id
                .clone()
        };

        self.sync_session(&tenant_id, user_id).await;

        let strict_mode = options.strict_mode.unwrap_or(self.default_strict_mode);
        debug!(
            user_id = %user_id,
            tenant_id = %tenant_id,
            accessible = accessible.len(),
            strict_mode,
            "Resolved tenant context"
        );

        Ok(TenantContext::new(
            tenant_id,
            user_id.clone(),
            role,
            accessible,
            strict_mode
        ))
    }

    /// Clears the session marker at the end of a request. Best-effort.
    pub async fn release_context(&self) {
        if !self.session_sync_enabled {
            return;
        }
        if let Err(e) = self.session.clear_tenant_context().await {
            errors::swallow("session_sync", e);
        }
    }

    pub async fn is_member(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId
    ) -> Result<bool, ResolutionError> {
        self.memberships.is_member(user_id, tenant_id).await
    }

    async fn sync_session(&self, tenant_id: &TenantId, user_id: &UserId) {
        if !self.session_sync_enabled {
            return;
        }
        // RLS is authoritative and may not need the marker at all.
        if let Err(e) = self.session.set_tenant_context(tenant_id, user_id).await {
            errors::swallow("session_sync", e);
        }
    }
}
