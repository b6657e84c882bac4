//! Shared test support for the tenant isolation workspace.
//!
//! - in-memory membership store, session sync and violation sinks
//! - a call-counting repository for guard tests
//! - a lazily started PostgreSQL container, shared per test process

mod fixtures;
mod repository;
mod sinks;
mod stores;

pub use fixtures::*;
pub use repository::{CountingRepository, RepositoryError, TestRecord};
pub use sinks::{
    FailingSessionSync, FailingViolationSink, RecordingSessionSync, RecordingViolationSink
};
pub use stores::{InMemoryMembershipStore, MemoryStoreError};

use chrono::{DateTime, Duration, Utc};
use tenant_core::{Role, TenantContext, TenantId, UserId};

pub fn tenant(id: &str) -> TenantId {
    TenantId::new(id.to_string()).expect("valid tenant id")
}

pub fn user(id: &str) -> UserId {
    UserId::new(id.to_string()).expect("valid user id")
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

/// Context active on the first of `tenants`, with all of them accessible.
pub fn context_for(user_id: &str, role: Role, tenants: &[&str], strict: bool) -> TenantContext {
    let active = tenants.first().expect("at least one tenant");
    TenantContext::new(
        tenant(active),
        user(user_id),
        role,
        tenants.iter().map(|t| tenant(t)).collect(),
        strict
    )
}
