//! Tenant context for the isolation layer.
//!
//! Resolution and enforcement happen in this order for every request:
//!
//! 1. [`ContextResolver`] turns an authenticated `(user, role)` into an
//!    immutable `TenantContext` using the principal's active memberships
//! 2. A request-owned [`ContextManager`] holds that context and answers
//!    every tenant question for the rest of the request
//! 3. Repositories are wrapped in an [`AccessGuard`] or
//!    [`GuardedRepository`] that refuses to forward calls without a context
//! 4. Denied cross-tenant attempts go to the [`ViolationLogger`]
//!
//! The database's row-level security re-checks the same boundary; nothing
//! here replaces it.
//!
//! # Example
//!
//! ```rust,ignore
//! use context::{ContextManager, ContextResolver};
//! use tenant_core::{ContextOptions, Role};
//!
//! let resolver = ContextResolver::new(store);
//! let ctx = resolver
//!     .resolve_context(&user_id, Role::Member, &ContextOptions::default())
//!     .await?;
//!
//! let mut manager = ContextManager::new();
//! manager.initialize(ctx);
//! let filter = manager.tenant_filter()?;
//! ```

pub mod guard;
pub mod manager;
pub mod membership;
mod resolver;
pub mod violation;

pub use guard::{AccessGuard, GuardedRepository};
pub use manager::{ContextManager, DenialReason, ValidationOutcome};
pub use membership::MembershipResolver;
pub use resolver::{ContextResolver, ResolutionResult};
pub use violation::{TracingViolationSink, ViolationLogger};
