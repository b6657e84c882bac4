//! # Tenant Isolation Core
//!
//! Shared types and capability traits for the tenant isolation layer.
//!
//! This crate provides:
//! - Identifier newtypes (`TenantId`, `UserId`) and the principal `Role`
//! - The immutable `TenantContext` and the `TenantFilter` derived from it
//! - Membership records as read from the membership store
//! - Capability traits for the external collaborators (membership store,
//!   session marker procedures, violation audit sink)

pub mod traits;
pub mod types;

pub use traits::{
    MembershipStore, NoopSessionSync, SessionContextSync, TenantScopedRepository, ViolationSink
};
pub use types::{
    ContextOptions, Membership, ResolvedMembership, Role, TenantContext, TenantFilter, TenantId,
    UserId, ViolationRecord
};
