//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles.
//!
//! # Naming Convention
//! - `TI_*`: Tenant isolation settings
//! - `PG_*`: PostgreSQL settings

use crate::config::{Config, IsolationConfig, PostgresConfig};
use std::env;

/// Load configuration from environment variables.
///
/// Unset variables keep their defaults. Set but unparsable variables are an
/// error.
///
/// ## Environment Variables
/// ### Isolation Settings (`TI_*`)
/// - `TI_DEFAULT_STRICT_MODE`: true/false (default: false)
/// - `TI_SESSION_SYNC_ENABLED`: true/false (default: true)
/// - `TI_VIOLATION_LOGGING_ENABLED`: true/false (default: true)
/// - `TI_RLS_TABLES`: comma separated table names (default: none)
/// - `TI_TENANT_COLUMN`: tenant column name (default: "organization_id")
///
/// ### PostgreSQL Settings (`PG_*`)
/// - `PG_HOST`, `PG_PORT`, `PG_DATABASE`, `PG_USERNAME`, `PG_PASSWORD`,
///   `PG_POOL_SIZE`, `PG_TIMEOUT_SECONDS`
pub fn load_from_env() -> Result<Config, Box<dyn std::error::Error>> {
    Ok(Config {
        isolation: load_isolation_from_env()?,
        postgres: load_postgres_from_env()?
    })
}

fn load_isolation_from_env() -> Result<IsolationConfig, Box<dyn std::error::Error>> {
    let defaults = IsolationConfig::default();
    Ok(IsolationConfig {
        default_strict_mode: parse_env_or("TI_DEFAULT_STRICT_MODE", defaults.default_strict_mode)?,
        session_sync_enabled: parse_env_or(
            "TI_SESSION_SYNC_ENABLED",
            defaults.session_sync_enabled
        )?,
        violation_logging_enabled: parse_env_or(
            "TI_VIOLATION_LOGGING_ENABLED",
            defaults.violation_logging_enabled
        )?,
        rls_tables: env::var("TI_RLS_TABLES")
            .map(|v| parse_list(&v))
            .unwrap_or(defaults.rls_tables),
        tenant_column: env::var("TI_TENANT_COLUMN").unwrap_or(defaults.tenant_column)
    })
}

fn load_postgres_from_env() -> Result<PostgresConfig, Box<dyn std::error::Error>> {
    let defaults = PostgresConfig::default();
    Ok(PostgresConfig {
        host: env::var("PG_HOST").unwrap_or(defaults.host),
        port: parse_env_or("PG_PORT", defaults.port)?,
        database: env::var("PG_DATABASE").unwrap_or(defaults.database),
        username: env::var("PG_USERNAME").unwrap_or(defaults.username),
        password: env::var("PG_PASSWORD").unwrap_or_default(),
        pool_size: parse_env_or("PG_POOL_SIZE", defaults.pool_size)?,
        timeout_seconds: parse_env_or("PG_TIMEOUT_SECONDS", defaults.timeout_seconds)?
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| format!("{key}: {e}").into()),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>),
    }
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if env::var_os(key).is_none() {
        return Ok(default);
    }
    parse_env(key)
}
