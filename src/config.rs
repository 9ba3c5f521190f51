// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration
//!
//! Settings come from an optional JSON file named by `SFU_CONFIG`, then from
//! individual environment variables which override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::engine::types::DEFAULT_SAFE_MODE;

pub const ENV_CONFIG_PATH: &str = "SFU_CONFIG";
pub const ENV_SAFE_MODE: &str = "SFU_SAFE_MODE";
pub const ENV_LOG_FILTER: &str = "SFU_LOG";
pub const ENV_LOG_FORMAT: &str = "SFU_LOG_FORMAT";

const DEFAULT_LOG_FILTER: &str = "sfu=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SfuConfig {
    /// Safe mode used when a caller does not pick one
    pub default_safe: bool,
    /// `tracing` filter directive, used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Emit JSON log lines instead of the human-readable format
    pub log_json: bool,
}

impl Default for SfuConfig {
    fn default() -> Self {
        Self {
            default_safe: DEFAULT_SAFE_MODE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_json: false,
        }
    }
}

impl SfuConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG_PATH).filter(|p| !p.is_empty()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(value) = lookup(ENV_SAFE_MODE) {
            config.default_safe =
                parse_bool_param(&value).ok_or_else(|| ConfigError::InvalidValue {
                    key: ENV_SAFE_MODE.to_string(),
                    value: value.clone(),
                })?;
        }

        if let Some(filter) = lookup(ENV_LOG_FILTER).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.log_json = match format.trim().to_ascii_lowercase().as_str() {
                "json" => true,
                "text" | "pretty" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_LOG_FORMAT.to_string(),
                        value: format,
                    })
                }
            };
        }

        Ok(config)
    }

    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: SfuConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }
}

pub(crate) fn parse_bool_param(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SfuConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, SfuConfig::default());
        assert!(config.default_safe);
        assert_eq!(config.log_filter, "sfu=info");
        assert!(!config.log_json);
    }

    #[test]
    fn test_env_overrides() {
        let config = SfuConfig::from_lookup(lookup_from(&[
            (ENV_SAFE_MODE, "off"),
            (ENV_LOG_FILTER, "sfu=debug"),
            (ENV_LOG_FORMAT, "JSON"),
        ]))
        .unwrap();
        assert!(!config.default_safe);
        assert_eq!(config.log_filter, "sfu=debug");
        assert!(config.log_json);
    }

    #[test]
    fn test_invalid_safe_mode() {
        let err = SfuConfig::from_lookup(lookup_from(&[(ENV_SAFE_MODE, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == ENV_SAFE_MODE));
    }

    #[test]
    fn test_invalid_log_format() {
        let err = SfuConfig::from_lookup(lookup_from(&[(ENV_LOG_FORMAT, "xml")])).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_safe": false, "log_json": true}}"#).unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = SfuConfig::from_lookup(lookup_from(&[(ENV_CONFIG_PATH, path.as_str())])).unwrap();
        assert!(!config.default_safe);
        assert!(config.log_json);
        assert_eq!(config.log_filter, "sfu=info");

        let config = SfuConfig::from_lookup(lookup_from(&[
            (ENV_CONFIG_PATH, path.as_str()),
            (ENV_SAFE_MODE, "yes"),
        ]))
        .unwrap();
        assert!(config.default_safe);
    }

    #[test]
    fn test_file_unknown_field_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"safe": false}}"#).unwrap();

        let err = SfuConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SfuConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_bool_param() {
        assert_eq!(parse_bool_param(" Yes "), Some(true));
        assert_eq!(parse_bool_param("0"), Some(false));
        assert_eq!(parse_bool_param("sometimes"), None);
    }
}
