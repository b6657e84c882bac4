//! # Configuration System
//!
//! Configuration for the tenant isolation layer.
//!
//! This crate provides:
//! - Configuration structures (isolation behaviour, PostgreSQL connection)
//! - Environment variable loading (12-factor app principles)
//! - Configuration file loading (TOML/YAML)
//! - Configuration validation via the `validator` crate

pub mod config;
pub mod file_loader;
pub mod loader;

pub use config::{Config, IsolationConfig, PostgresConfig, is_sql_identifier};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use validator::Validate;
