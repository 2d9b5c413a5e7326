//! Configuration types

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BladeConfig {
    /// View directories, searched in order
    pub view_paths: Vec<PathBuf>,
    /// Directory for compiled templates
    pub cache_path: PathBuf,
    /// File extensions tried for every view, in order
    pub extensions: Vec<String>,
    /// Inner extension marking template source (`home.blade.html`)
    pub template_marker: String,
    /// Persist compiled templates in `cache_path`
    pub disk_cache: bool,
    /// Namespace hints: prefix to directories
    pub namespaces: BTreeMap<String, Vec<PathBuf>>,
    /// Version of the application's custom directives; changing it rebuilds
    /// cached templates
    pub compiler_version: Option<String>,
}

impl Default for BladeConfig {
    fn default() -> Self {
        Self {
            view_paths: vec![PathBuf::from("views")],
            cache_path: default_cache_path(),
            extensions: ["blade.html", "blade.txt", "html", "txt"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            template_marker: "blade".to_string(),
            disk_cache: true,
            namespaces: BTreeMap::new(),
            compiler_version: None,
        }
    }
}

impl BladeConfig {
    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.view_paths.is_empty() {
            return Err(ConfigError::Validation(
                "At least one view path is required".to_string(),
            ));
        }
        if self.extensions.is_empty() || self.extensions.iter().any(|e| e.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "Extensions must be a non-empty list of non-empty strings".to_string(),
            ));
        }
        if self.template_marker.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Template marker must not be empty".to_string(),
            ));
        }
        if let Some((namespace, _)) = self.namespaces.iter().find(|(name, dirs)| name.is_empty() || dirs.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "Namespace [{namespace}] needs a name and at least one directory"
            )));
        }
        Ok(())
    }
}

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bladeforge")
        .join("views")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BladeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.view_paths, vec![PathBuf::from("views")]);
        assert!(config.cache_path.ends_with("bladeforge/views"));
        assert!(config.disk_cache);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = BladeConfig {
            view_paths: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = BladeConfig {
            extensions: vec![" ".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = BladeConfig {
            template_marker: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = BladeConfig::default();
        config.namespaces.insert("mail".to_string(), Vec::new());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: BladeConfig = toml::from_str("disk_cache = false").unwrap();
        assert!(!config.disk_cache);
        assert_eq!(config.template_marker, "blade");
        assert_eq!(config.compiler_version, None);

        let config: BladeConfig = toml::from_str("compiler_version = \"7\"").unwrap();
        assert_eq!(config.compiler_version.as_deref(), Some("7"));
    }

    proptest! {
        #[test]
        fn prop_blank_extension_is_rejected(
            mut extensions in prop::collection::vec("[a-z]{1,5}(\\.[a-z]{1,5})?", 0..4),
            position in 0usize..4,
            blank in "[ \t]{0,3}",
        ) {
            let position = position.min(extensions.len());
            extensions.insert(position, blank);
            let config = BladeConfig {
                extensions,
                ..Default::default()
            };
            prop_assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        }
    }
}
