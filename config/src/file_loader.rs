//! # Configuration File Loading
//!
//! Loads configuration from TOML or YAML files, detecting the format from
//! the file extension. Loaded configuration is validated before it is
//! returned.

use crate::config::Config;
use std::path::Path;
use validator::Validate;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Load configuration from a TOML file.
pub fn load_from_toml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = read(path)?;
    let config: Config =
        toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a YAML file.
pub fn load_from_yaml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = read(path)?;
    let config: Config =
        serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from file with auto-detection.
///
/// ## Supported Formats
/// - `.toml`: TOML format
/// - `.yaml` / `.yml`: YAML format
pub fn load_from_file(path: &Path) -> Result<Config, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    tracing::debug!("Loading configuration from {}", path.display());

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
    }
}

fn read(path: &Path) -> Result<String, ConfigFileError> {
    std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("isolation.toml");

        let toml_content = r#"
[isolation]
default_strict_mode = true
rls_tables = ["dossiers", "mous"]

[postgres]
host = "testhost"
port = 5433
database = "testdb"
"#;
        fs::write(&path, toml_content).unwrap();

        let config = load_from_file(&path).unwrap();
        assert!(config.isolation.default_strict_mode);
        assert!(config.isolation.session_sync_enabled);
        assert_eq!(config.isolation.rls_tables, vec!["dossiers", "mous"]);
        assert_eq!(config.postgres.host, "testhost");
        assert_eq!(config.postgres.port, 5433);
        assert_eq!(config.postgres.pool_size, 10);
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("isolation.yml");

        let yaml_content = r#"
isolation:
  violation_logging_enabled: false
  tenant_column: tenant_id
postgres:
  username: app
"#;
        fs::write(&path, yaml_content).unwrap();

        let config = load_from_file(&path).unwrap();
        assert!(!config.isolation.violation_logging_enabled);
        assert_eq!(config.isolation.tenant_column, "tenant_id");
        assert_eq!(config.postgres.username, "app");
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("isolation.toml");
        fs::write(&path, "[isolation]\nrls_tables = [\"users; --\"]\n").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::Invalid(_))));
    }

    #[test]
    fn test_unsupported_and_missing() {
        let dir = TempDir::new().unwrap();

        let json = dir.path().join("isolation.json");
        fs::write(&json, "{}").unwrap();
        assert!(matches!(
            load_from_file(&json),
            Err(ConfigFileError::UnsupportedFormat(_))
        ));

        let bare = dir.path().join("isolation");
        assert!(matches!(load_from_file(&bare), Err(ConfigFileError::NoExtension)));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_from_file(&missing),
            Err(ConfigFileError::FileNotFound(_))
        ));
    }
}
