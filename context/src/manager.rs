//! Request-scoped holder of the tenant context.
//!
//! One `ContextManager` belongs to exactly one request or task. It is a plain
//! value: create it when the request starts, pass it by reference down the
//! call chain, drop it (or [`ContextManager::clear`] it) when the request
//! ends. There is no process-wide instance.
//!
//! Accessors split in two groups:
//! - `context()`, `is_strict_mode()`, `can_access_tenant()` tolerate an
//!   uninitialized manager and answer with "nothing"/"no"
//! - `tenant_id()`, `user_id()`, `tenant_filter()` fail with
//!   [`TenancyError::NotInitialized`]; there is no default scope

use std::fmt;

use errors::TenancyError;
use tenant_core::{TenantContext, TenantFilter, TenantId, UserId};
use tracing::{debug, warn};

use crate::violation::ViolationLogger;

/// Why `validate_tenant_access` refused a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    NoContext,
    StrictModeMismatch {
        active: TenantId,
        attempted: TenantId
    },
    AccessDenied {
        attempted: TenantId
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NoContext => write!(f, "no context"),
            DenialReason::StrictModeMismatch { .. } => write!(f, "strict mode mismatch"),
            DenialReason::AccessDenied { .. } => write!(f, "access denied")
        }
    }
}

/// Result of validating an entity's tenant against the current context.
///
/// A denial is an expected branch, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid { tenant_id: TenantId },
    Invalid { reason: DenialReason }
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid { .. })
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            ValidationOutcome::Valid { tenant_id } => Some(tenant_id),
            ValidationOutcome::Invalid { .. } => None
        }
    }

    pub fn error(&self) -> Option<&DenialReason> {
        match self {
            ValidationOutcome::Valid { .. } => None,
            ValidationOutcome::Invalid { reason } => Some(reason)
        }
    }

    pub fn into_result(self) -> Result<TenantId, DenialReason> {
        match self {
            ValidationOutcome::Valid { tenant_id } => Ok(tenant_id),
            ValidationOutcome::Invalid { reason } => Err(reason)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    context: Option<TenantContext>,
    violations: Option<ViolationLogger>
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager already holding `context`.
    pub fn from_context(context: TenantContext) -> Self {
        Self {
            context: Some(context),
            violations: None
        }
    }

    /// Denials seen by [`ContextManager::authorize`] are reported here.
    #[must_use]
    pub fn with_violation_logger(mut self, logger: ViolationLogger) -> Self {
        self.violations = Some(logger);
        self
    }

    /// Stores `context`, replacing any previous one.
    pub fn initialize(&mut self, context: TenantContext) {
        debug!(
            tenant_id = %context.tenant_id(),
            user_id = %context.user_id(),
            strict = context.strict_mode(),
            "Tenant context initialized"
        );
        self.context = Some(context);
    }

    pub fn clear(&mut self) {
        self.context = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self) -> Option<&TenantContext> {
        self.context.as_ref()
    }

    pub fn tenant_id(&self) -> Result<&TenantId, TenancyError> {
        self.require("tenant_id").map(TenantContext::tenant_id)
    }

    pub fn user_id(&self) -> Result<&UserId, TenancyError> {
        self.require("user_id").map(TenantContext::user_id)
    }

    pub fn is_strict_mode(&self) -> bool {
        self.context.as_ref().is_some_and(TenantContext::strict_mode)
    }

    pub fn can_access_tenant(&self, tenant_id: &TenantId) -> bool {
        self.context.as_ref().is_some_and(|c| c.can_access(tenant_id))
    }

    /// Checks an entity's tenant against the context.
    ///
    /// The strict-mode check runs before the membership check and also
    /// binds admins.
    pub fn validate_tenant_access(&self, entity_tenant_id: &TenantId) -> ValidationOutcome {
        let Some(context) = self.context.as_ref() else {
            return ValidationOutcome::Invalid {
                reason: DenialReason::NoContext
            };
        };

        if context.strict_mode() && entity_tenant_id != context.tenant_id() {
            return ValidationOutcome::Invalid {
                reason: DenialReason::StrictModeMismatch {
                    active: context.tenant_id().clone(),
                    attempted: entity_tenant_id.clone()
                }
            };
        }

        if !context.can_access(entity_tenant_id) {
            return ValidationOutcome::Invalid {
                reason: DenialReason::AccessDenied {
                    attempted: entity_tenant_id.clone()
                }
            };
        }

        ValidationOutcome::Valid {
            tenant_id: entity_tenant_id.clone()
        }
    }

    /// Tenant scope repositories must put in their tenant-column predicate.
    pub fn tenant_filter(&self) -> Result<TenantFilter, TenancyError> {
        self.require("tenant_filter").map(TenantContext::tenant_filter)
    }

    /// Single-tenant strict copy of the current context.
    ///
    /// `None` when uninitialized or when the principal may not access
    /// `tenant_id`. The stored context is left untouched.
    pub fn create_scoped_context(&self, tenant_id: &TenantId) -> Option<TenantContext> {
        let context = self.context.as_ref()?;
        if !context.can_access(tenant_id) {
            return None;
        }
        Some(context.scoped_to(tenant_id.clone()))
    }

    /// Nested manager holding a scoped context, for one bounded operation.
    pub fn scoped(&self, tenant_id: &TenantId) -> Option<ContextManager> {
        self.create_scoped_context(tenant_id).map(|context| ContextManager {
            context: Some(context),
            violations: self.violations.clone()
        })
    }

    /// Validates `tenant_id` for `resource.operation`.
    ///
    /// Denials are reported to the violation logger and come back as
    /// [`TenancyError::AccessDenied`]; a missing context is
    /// [`TenancyError::ContextRequired`].
    pub fn authorize(
        &self,
        tenant_id: &TenantId,
        resource: &str,
        operation: &str
    ) -> Result<TenantId, TenancyError> {
        match self.validate_tenant_access(tenant_id).into_result() {
            Ok(tenant_id) => Ok(tenant_id),
            Err(DenialReason::NoContext) => {
                Err(TenancyError::context_required(resource, operation))
            }
            Err(reason) => {
                let user_id = self
                    .context
                    .as_ref()
                    .map(|c| c.user_id().as_str())
                    .unwrap_or_default();
                warn!(
                    user_id,
                    attempted_tenant_id = %tenant_id,
                    resource,
                    operation,
                    reason = %reason,
                    "Tenant access denied"
                );
                if let Some(logger) = &self.violations {
                    logger.log_access_violation(user_id, tenant_id.as_str(), resource, operation);
                }
                Err(TenancyError::AccessDenied {
                    tenant_id: tenant_id.to_string(),
                    reason: reason.to_string()
                })
            }
        }
    }

    fn require(&self, accessor: &str) -> Result<&TenantContext, TenancyError> {
        self.context
            .as_ref()
            .ok_or_else(|| TenancyError::not_initialized(accessor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tenant_core::Role;
    use testing::{RecordingViolationSink, context_for, tenant};

    fn member(tenants: &[&str], strict: bool) -> ContextManager {
        ContextManager::from_context(context_for("u1", Role::Member, tenants, strict))
    }

    #[test]
    fn test_uninitialized_hard_accessors_fail() {
        let manager = ContextManager::new();

        assert_eq!(
            manager.tenant_id().unwrap_err(),
            TenancyError::not_initialized("tenant_id")
        );
        assert!(matches!(
            manager.user_id(),
            Err(TenancyError::NotInitialized { .. })
        ));
        assert!(matches!(
            manager.tenant_filter(),
            Err(TenancyError::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_uninitialized_soft_accessors_default() {
        let manager = ContextManager::new();

        assert!(manager.context().is_none());
        assert!(!manager.is_strict_mode());
        assert!(!manager.can_access_tenant(&tenant("t1")));
        assert!(manager.create_scoped_context(&tenant("t1")).is_none());
        assert_eq!(
            manager.validate_tenant_access(&tenant("t1")).error(),
            Some(&DenialReason::NoContext)
        );
    }

    #[test]
    fn test_initialize_and_clear() {
        let mut manager = ContextManager::new();
        manager.initialize(context_for("u1", Role::Member, &["t1"], false));
        assert_eq!(manager.tenant_id().unwrap(), &tenant("t1"));
        assert_eq!(manager.user_id().unwrap().as_str(), "u1");

        manager.initialize(context_for("u2", Role::Member, &["t5"], true));
        assert_eq!(manager.tenant_id().unwrap(), &tenant("t5"));
        assert!(manager.is_strict_mode());

        manager.clear();
        assert!(!manager.is_initialized());
        assert!(manager.tenant_id().is_err());
    }

    #[test]
    fn test_strict_mode_only_active_tenant_is_valid() {
        let manager = member(&["t1", "t2"], true);

        let outcome = manager.validate_tenant_access(&tenant("t1"));
        assert!(outcome.is_valid());
        assert_eq!(outcome.tenant_id(), Some(&tenant("t1")));

        let outcome = manager.validate_tenant_access(&tenant("t2"));
        assert!(!outcome.is_valid());
        assert_eq!(outcome.error().unwrap().to_string(), "strict mode mismatch");
    }

    #[test]
    fn test_strict_mode_binds_admins() {
        let manager =
            ContextManager::from_context(context_for("root", Role::Admin, &["t1"], true));

        assert!(manager.can_access_tenant(&tenant("t9")));
        assert!(!manager.validate_tenant_access(&tenant("t9")).is_valid());
    }

    #[test]
    fn test_permissive_mode_uses_membership() {
        let manager = member(&["t1", "t2"], false);

        assert!(manager.validate_tenant_access(&tenant("t2")).is_valid());
        let outcome = manager.validate_tenant_access(&tenant("t3"));
        assert_eq!(
            outcome.error(),
            Some(&DenialReason::AccessDenied {
                attempted: tenant("t3")
            })
        );
        assert_eq!(outcome.error().unwrap().to_string(), "access denied");
    }

    #[test]
    fn test_tenant_filter_by_mode() {
        assert_eq!(
            member(&["t1", "t2"], true).tenant_filter().unwrap(),
            TenantFilter::Single(tenant("t1"))
        );
        assert_eq!(
            member(&["t1", "t2"], false).tenant_filter().unwrap(),
            TenantFilter::AnyOf([tenant("t1"), tenant("t2")].into_iter().collect())
        );
    }

    #[test]
    fn test_scoped_context_is_strict_and_source_unchanged() {
        let manager = member(&["t1", "t2"], false);

        let scoped = manager.create_scoped_context(&tenant("t2")).unwrap();
        assert_eq!(scoped.tenant_id(), &tenant("t2"));
        assert!(scoped.strict_mode());

        assert_eq!(manager.tenant_id().unwrap(), &tenant("t1"));
        assert!(!manager.is_strict_mode());
        assert!(manager.create_scoped_context(&tenant("t3")).is_none());
    }

    #[test]
    fn test_nested_scope_does_not_touch_ambient() {
        let manager =
            ContextManager::from_context(context_for("root", Role::Admin, &["t1"], false));

        let nested = manager.scoped(&tenant("t7")).unwrap();
        assert_eq!(nested.tenant_id().unwrap(), &tenant("t7"));
        assert_eq!(
            nested.tenant_filter().unwrap(),
            TenantFilter::Single(tenant("t7"))
        );
        assert!(!nested.validate_tenant_access(&tenant("t1")).is_valid());

        assert_eq!(manager.tenant_id().unwrap(), &tenant("t1"));
    }

    #[tokio::test]
    async fn test_authorize_denial_logs_violation() {
        let sink = Arc::new(RecordingViolationSink::new());
        let manager = member(&["t1"], false)
            .with_violation_logger(ViolationLogger::new(sink.clone()));

        assert_eq!(
            manager.authorize(&tenant("t1"), "dossiers", "get").unwrap(),
            tenant("t1")
        );

        let err = manager
            .authorize(&tenant("t2"), "dossiers", "get")
            .unwrap_err();
        assert!(matches!(err, TenancyError::AccessDenied { .. }));

        sink.wait_for(1).await;
        let records = sink.records();
        assert_eq!(records[0].attempted_tenant_id, "t2");
        assert_eq!(records[0].user_id, "u1");
    }

    #[test]
    fn test_authorize_without_context_requires_context() {
        let manager = ContextManager::new();
        let err = manager
            .authorize(&tenant("t1"), "dossiers", "list")
            .unwrap_err();
        assert_eq!(err, TenancyError::context_required("dossiers", "list"));
    }
}
