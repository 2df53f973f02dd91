use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::notes::DEFAULT_PREFIX;
use crate::sanitize::DEFAULT_MAX_DEPTH;

/// Default dataset location, relative to the working directory.
pub const DEFAULT_DATASET_PATH: &str = "data/th_budget_FY2025.json";

/// Default file for persisted notes.
pub const DEFAULT_NOTES_PATH: &str = "budget_notes.json";

/// Default pixel ratio for image export.
pub const DEFAULT_EXPORT_SCALE: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset_path: PathBuf,
    pub notes_path: PathBuf,
    pub notes_prefix: String,
    /// Deepest nesting accepted from a dataset
    pub max_depth: usize,
    pub export_scale: f32,
    pub log_filter: String,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            notes_path: PathBuf::from(DEFAULT_NOTES_PATH),
            notes_prefix: DEFAULT_PREFIX.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            export_scale: DEFAULT_EXPORT_SCALE,
            log_filter: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults or the given file, then `BUDGETMAP_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from a variable lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup("BUDGETMAP_DATASET") {
            self.dataset_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("BUDGETMAP_NOTES") {
            self.notes_path = PathBuf::from(path);
        }
        if let Some(flag) = lookup("BUDGETMAP_LOG_JSON") {
            self.log_json = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.dataset_path, PathBuf::from(DEFAULT_DATASET_PATH));
        assert_eq!(config.notes_prefix, "thb_notes::");
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            dataset_path = "/srv/budget.json"
            max_depth = 12
            "#,
        )
        .unwrap();
        assert_eq!(config.dataset_path, PathBuf::from("/srv/budget.json"));
        assert_eq!(config.max_depth, 12);
        assert_eq!(config.export_scale, DEFAULT_EXPORT_SCALE);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("max_depth = \"deep\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BUDGETMAP_DATASET", "other.json"),
            ("BUDGETMAP_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();
        let config = Config::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.dataset_path, PathBuf::from("other.json"));
        assert!(config.log_json);
        assert_eq!(config.notes_path, PathBuf::from(DEFAULT_NOTES_PATH));
    }
}
