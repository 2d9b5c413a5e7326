//! Configuration manager implementation

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::debug;

use crate::{
    error::{ConfigError, Result},
    types::BladeConfig,
};

/// Default prefix of configuration environment variables
pub const DEFAULT_ENV_PREFIX: &str = "BLADE";

/// Loads and saves [`BladeConfig`]
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a manager for the default configuration file
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    /// Create with custom config path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bladeforge")
            .join("config.toml")
    }

    /// Load the configuration file (if present), apply environment overrides
    /// and validate the result
    pub fn load(&self) -> Result<BladeConfig> {
        let builder = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("view_paths")
                    .with_list_parse_key("extensions"),
            );

        let config = builder.build()?;
        let blade_config: BladeConfig = config.try_deserialize()?;
        blade_config.validate()?;

        debug!(
            path = %self.config_path.display(),
            views = blade_config.view_paths.len(),
            "Loaded configuration"
        );
        Ok(blade_config)
    }

    /// Write `config` as TOML to the configuration file
    pub fn save(&self, config: &BladeConfig) -> Result<()> {
        config.validate()?;
        let toml = toml::to_string_pretty(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("absent.toml"))
            .with_env_prefix("BLADETEST_MISSING");
        assert_eq!(manager.load().unwrap(), BladeConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(&path).with_env_prefix("BLADETEST_SAVE");

        let mut config = BladeConfig {
            view_paths: vec![PathBuf::from("/srv/views"), PathBuf::from("/srv/shared")],
            cache_path: PathBuf::from("/tmp/blade-cache"),
            disk_cache: false,
            compiler_version: Some("2024.1".to_string()),
            ..Default::default()
        };
        config
            .namespaces
            .insert("mail".to_string(), vec![PathBuf::from("/srv/mail")]);
        manager.save(&config).unwrap();

        assert!(path.exists());
        assert_eq!(manager.load().unwrap(), config);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cache_path = \"/from/file\"\ntemplate_marker = \"tpl\"\n").unwrap();

        std::env::set_var("BLADETEST_ENV_CACHE_PATH", "/from/env");
        std::env::set_var("BLADETEST_ENV_VIEW_PATHS", "/a,/b");
        let manager = ConfigManager::with_path(&path).with_env_prefix("BLADETEST_ENV");
        let config = manager.load().unwrap();
        std::env::remove_var("BLADETEST_ENV_CACHE_PATH");
        std::env::remove_var("BLADETEST_ENV_VIEW_PATHS");

        assert_eq!(config.cache_path, PathBuf::from("/from/env"));
        assert_eq!(config.template_marker, "tpl");
        assert_eq!(
            config.view_paths,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "view_paths = []\n").unwrap();
        let manager = ConfigManager::with_path(&path).with_env_prefix("BLADETEST_INVALID");
        assert!(matches!(manager.load(), Err(ConfigError::Validation(_))));

        std::fs::write(&path, "disk_cache = \"maybe\"\n").unwrap();
        assert!(matches!(manager.load(), Err(ConfigError::Parse(_))));
    }
}
