//! # Configuration Structures
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Fall back to defaults for every missing field

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level configuration.
///
/// ## Usage
/// ```rust,no_run
/// use config::Config;
///
/// let config = Config::default();
/// assert!(!config.isolation.default_strict_mode);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    /// Tenant isolation behaviour
    #[serde(default)]
    #[validate(nested)]
    pub isolation: IsolationConfig,

    /// PostgreSQL connection used by the membership store, session
    /// procedures and the violation audit table
    #[serde(default)]
    #[validate(nested)]
    pub postgres: PostgresConfig
}

/// Tenant isolation behaviour.
///
/// ## Fields
/// - `default_strict_mode`: strict mode used when a resolution request does
///   not specify one (default: false)
/// - `session_sync_enabled`: call `set_tenant_context` after resolution
///   (default: true)
/// - `violation_logging_enabled`: record denied cross-tenant attempts
///   (default: true)
/// - `rls_tables`: tables that get a tenant isolation policy during
///   migration; each must be a plain SQL identifier
/// - `tenant_column`: column holding the tenant id in those tables
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct IsolationConfig {
    #[serde(default)]
    pub default_strict_mode: bool,

    #[serde(default = "default_true")]
    pub session_sync_enabled: bool,

    #[serde(default = "default_true")]
    pub violation_logging_enabled: bool,

    #[serde(default)]
    #[validate(custom(function = "validate_identifiers"))]
    pub rls_tables: Vec<String>,

    #[serde(default = "default_tenant_column")]
    #[validate(length(min = 1, max = 63), custom(function = "validate_identifier"))]
    pub tenant_column: String
}

fn default_true() -> bool {
    true
}

fn default_tenant_column() -> String {
    "organization_id".to_string()
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            default_strict_mode: false,
            session_sync_enabled: default_true(),
            violation_logging_enabled: default_true(),
            rls_tables: Vec::new(),
            tenant_column: default_tenant_column()
        }
    }
}

/// True if `value` can be interpolated into DDL as an unquoted identifier.
pub fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false
    }
    value.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn validate_identifier(value: &str) -> Result<(), validator::ValidationError> {
    if is_sql_identifier(value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("Invalid SQL identifier"))
    }
}

fn validate_identifiers(values: &[String]) -> Result<(), validator::ValidationError> {
    values.iter().try_for_each(|v| validate_identifier(v))
}

/// PostgreSQL connection settings.
///
/// ## Fields
/// - `host`: Database server hostname (default: "localhost")
/// - `port`: Database server port (default: 5432)
/// - `database`: Database name (default: "postgres")
/// - `username`: Database user (default: "postgres")
/// - `password`: Database password (default: "", set it through `PG_PASSWORD`)
/// - `pool_size`: Maximum connections in pool (default: 10, range: 1-100)
/// - `timeout_seconds`: Connection timeout (default: 30, range: 1-300)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PostgresConfig {
    #[serde(default = "default_postgres_host")]
    #[validate(length(min = 1, max = 255))]
    pub host: String,

    #[serde(default = "default_postgres_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    #[serde(default = "default_postgres_database")]
    #[validate(length(min = 1, max = 63))]
    pub database: String,

    #[serde(default = "default_postgres_username")]
    #[validate(length(min = 1, max = 63))]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_postgres_pool_size")]
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,

    #[serde(default = "default_postgres_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "postgres".to_string()
}

fn default_postgres_username() -> String {
    "postgres".to_string()
}

fn default_postgres_pool_size() -> u32 {
    10
}

fn default_postgres_timeout() -> u64 {
    30
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_postgres_host(),
            port: default_postgres_port(),
            database: default_postgres_database(),
            username: default_postgres_username(),
            password: String::new(),
            pool_size: default_postgres_pool_size(),
            timeout_seconds: default_postgres_timeout()
        }
    }
}

impl PostgresConfig {
    pub fn connection_url(&self) -> String {
        if self.password.is_empty() {
            format!(
                "postgres://{}@{}:{}/{}",
                self.username, self.host, self.port, self.database
            )
        } else {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.database
            )
        }
    }
}
