//! # Storage Layer
//!
//! PostgreSQL adapters for the tenant isolation layer: the membership store,
//! the session marker procedures, the violation table and the row-level
//! security backstop.

pub mod audit;
pub mod pool;
pub mod postgres;
pub mod query_builder;
pub mod rls_migration;
pub mod session;

pub use audit::PgViolationSink;
pub use pool::connect;
pub use postgres::{MembershipStoreError, PgMembershipStore};
pub use query_builder::TenantQueryBuilder;
pub use rls_migration::{RlsMigrationError, RlsMigrationReport, run_rls_migration};
pub use session::PgSessionSync;

/// SQLSTATE for a call to a function that does not exist.
pub(crate) const UNDEFINED_FUNCTION: &str = "42883";
/// SQLSTATE for a reference to a table that does not exist.
pub(crate) const UNDEFINED_TABLE: &str = "42P01";

pub(crate) fn has_sqlstate(error: &sqlx::Error, code: &str) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false
    }
}
