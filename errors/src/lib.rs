//! # Tenant Isolation Errors
//!
//! Error taxonomy for the tenant isolation layer.
//!
//! Errors fall in two categories:
//! - **Fail-closed**: anything that would let an operation run without a
//!   validated tenant scope. These are returned to the caller and must stop
//!   the current operation.
//! - **Degradable**: secondary consistency aids (session marker sync,
//!   violation auditing). These are caught where they happen, logged as
//!   warnings and never propagated.
//!
//! Uses `thiserror` with named fields for every variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a failure must be treated by the code that observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Stop the operation and surface an authorization failure.
    FailClosed,
    /// Log and continue; the database RLS remains authoritative.
    Degradable
}

/// Failures of the per-request tenant context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenancyError {
    #[error("Tenant context not initialized: {accessor} called before initialize")]
    NotInitialized { accessor: String },

    #[error("Tenant context required for {resource}.{operation}")]
    ContextRequired { resource: String, operation: String },

    #[error("Access denied to tenant {tenant_id}: {reason}")]
    AccessDenied { tenant_id: String, reason: String }
}

impl TenancyError {
    pub fn not_initialized(accessor: &str) -> Self {
        Self::NotInitialized {
            accessor: accessor.to_string()
        }
    }

    pub fn context_required(resource: &str, operation: &str) -> Self {
        Self::ContextRequired {
            resource: resource.to_string(),
            operation: operation.to_string()
        }
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::FailClosed
    }

    /// True for the programmer-error class (context used before it exists).
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized { .. } | Self::ContextRequired { .. }
        )
    }
}

/// Reasons a principal could not be given a tenant context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No active memberships for user {user_id}")]
    NoMemberships { user_id: String },

    #[error("Access denied to tenant {tenant_id} for user {user_id}")]
    AccessDenied { user_id: String, tenant_id: String },

    #[error("Membership lookup failed: {reason}")]
    MembershipLookup { reason: String }
}

impl ResolutionError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::FailClosed
    }
}

/// Failures of the best-effort session marker procedures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionSyncError {
    #[error("Session procedure {procedure} is not available")]
    ProcedureUnavailable { procedure: String },

    #[error("Session procedure {procedure} failed: {reason}")]
    ProcedureFailed { procedure: String, reason: String }
}

impl SessionSyncError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Degradable
    }
}

/// Failures of the violation audit sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("Audit sink {sink} unavailable: {reason}")]
    SinkUnavailable { sink: String, reason: String },

    #[error("Audit write to {sink} failed: {reason}")]
    WriteFailed { sink: String, reason: String }
}

impl AuditError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Degradable
    }
}

/// Logs a degradable failure and drops it.
pub fn swallow<E: std::fmt::Display>(component: &str, error: E) {
    tracing::warn!(component, error = %error, "Ignoring soft dependency failure");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_initialized_message_names_accessor() {
        let err = TenancyError::not_initialized("tenant_id");
        assert_eq!(
            err.to_string(),
            "Tenant context not initialized: tenant_id called before initialize"
        );
        assert!(err.is_programmer_error());
    }

    #[test]
    fn test_access_denied_is_not_programmer_error() {
        let err = TenancyError::AccessDenied {
            tenant_id: "t2".to_string(),
            reason: "strict mode mismatch".to_string()
        };
        assert!(!err.is_programmer_error());
        assert_eq!(err.category(), ErrorCategory::FailClosed);
    }

    #[test]
    fn test_soft_failures_are_degradable() {
        let sync = SessionSyncError::ProcedureUnavailable {
            procedure: "set_tenant_context".to_string()
        };
        let audit = AuditError::WriteFailed {
            sink: "postgres".to_string(),
            reason: "timeout".to_string()
        };
        assert_eq!(sync.category(), ErrorCategory::Degradable);
        assert_eq!(audit.category(), ErrorCategory::Degradable);
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::FailClosed).unwrap();
        assert_eq!(json, "\"fail_closed\"");
    }
}
