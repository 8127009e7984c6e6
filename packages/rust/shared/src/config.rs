//! Application configuration for docnorm.
//!
//! User config lives at `~/.docnorm/docnorm.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocNormError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docnorm.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docnorm";

// ---------------------------------------------------------------------------
// Config structs (matching docnorm.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// `[discovery]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Additional directory names to exclude, on top of the built-in set
    /// (hidden directories, `documentation`, `node_modules`, `_normalized`).
    #[serde(default)]
    pub extra_exclude_dirs: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docnorm/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocNormError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docnorm/docnorm.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocNormError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocNormError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocNormError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocNormError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocNormError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[discovery]"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert!(parsed.discovery.extra_exclude_dirs.is_empty());
    }

    #[test]
    fn config_with_extra_excludes() {
        let toml_str = r#"
[discovery]
extra_exclude_dirs = ["vendor", "target"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.discovery.extra_exclude_dirs.len(), 2);
        assert_eq!(config.discovery.extra_exclude_dirs[0], "vendor");
    }

    #[test]
    fn load_config_from_missing_file_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_config_from(&dir.path().join("nope.toml"));
        assert!(result.is_err());
    }
}
