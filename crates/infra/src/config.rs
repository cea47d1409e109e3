//! Layered configuration: defaults, then an optional TOML file, then
//! `REORDER_*` environment overrides, then validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use reorder_observability::{LoggingConfig, LoggingConfigError};
use reorder_recommender::{RankerConfig, RecommendError};
use reorder_session::SessionConfig;

pub const ENV_TOP_K: &str = "REORDER_TOP_K";
pub const ENV_MIN_CONFIDENCE: &str = "REORDER_MIN_CONFIDENCE";
pub const ENV_FREQUENCY_SATURATION: &str = "REORDER_FREQUENCY_SATURATION";
pub const ENV_SESSION_TIMEOUT_HOURS: &str = "REORDER_SESSION_TIMEOUT_HOURS";
pub const ENV_SINGLE_PURCHASE_PRIOR: &str = "REORDER_SINGLE_PURCHASE_PRIOR";
pub const ENV_MAX_TOTAL_UNITS: &str = "REORDER_MAX_TOTAL_UNITS";
pub const ENV_LOG_LEVEL: &str = "REORDER_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "REORDER_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl From<RecommendError> for ConfigError {
    fn from(value: RecommendError) -> Self {
        ConfigError::Validation(value.to_string())
    }
}

impl From<LoggingConfigError> for ConfigError {
    fn from(value: LoggingConfigError) -> Self {
        ConfigError::Validation(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    pub ranker: RankerConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

impl ReorderConfig {
    /// Load from the process environment and, if present, a config file.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        Self::load_with_env(options, |key| std::env::var(key).ok())
    }

    /// Same as [`ReorderConfig::load`] with an explicit environment lookup.
    pub fn load_with_env<F>(options: LoadOptions, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => read_file(&path)?,
            None if options.require_file => {
                let expected = options
                    .config_path
                    .unwrap_or_else(|| PathBuf::from("reorder.toml"));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => Self::default(),
        };

        config.apply_env_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections and keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env_overrides<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = read(ENV_TOP_K) {
            self.ranker.top_k = parse(ENV_TOP_K, &value)?;
        }
        if let Some(value) = read(ENV_MIN_CONFIDENCE) {
            self.ranker.min_confidence = parse(ENV_MIN_CONFIDENCE, &value)?;
        }
        if let Some(value) = read(ENV_FREQUENCY_SATURATION) {
            self.ranker.frequency_saturation = parse(ENV_FREQUENCY_SATURATION, &value)?;
        }
        if let Some(value) = read(ENV_SINGLE_PURCHASE_PRIOR) {
            self.ranker.single_purchase_prior = parse(ENV_SINGLE_PURCHASE_PRIOR, &value)?;
        }
        if let Some(value) = read(ENV_MAX_TOTAL_UNITS) {
            // "none" lifts a cap set in the file.
            self.ranker.max_total_units = match value.trim().to_ascii_lowercase().as_str() {
                "none" | "off" => None,
                _ => Some(parse(ENV_MAX_TOTAL_UNITS, &value)?),
            };
        }
        if let Some(value) = read(ENV_SESSION_TIMEOUT_HOURS) {
            self.session.timeout_hours = parse(ENV_SESSION_TIMEOUT_HOURS, &value)?;
        }
        if let Some(value) = read(ENV_LOG_LEVEL) {
            self.logging.level = value.trim().to_string();
        }
        if let Some(value) = read(ENV_LOG_FORMAT) {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ranker.validate()?;
        self.session
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.logging.validate()?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("reorder.toml"), PathBuf::from("config/reorder.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_file(path: &Path) -> Result<ReorderConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use reorder_observability::LogFormat;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn no_file() -> LoadOptions {
        LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/reorder.toml")),
            require_file: false,
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ReorderConfig::load_with_env(no_file(), env_of(&[])).unwrap();
        assert_eq!(config.ranker.top_k, 10);
        assert_eq!(config.ranker.min_confidence, 0.15);
        assert_eq!(config.ranker.frequency_saturation, 5);
        assert_eq!(config.ranker.single_purchase_prior, 0.2);
        assert_eq!(config.ranker.max_total_units, None);
        assert_eq!(config.session.timeout_hours, 24);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ReorderConfig::from_toml_str(
            r#"
[ranker]
top_k = 3
max_total_units = 12

[logging]
format = "compact"
"#,
        )
        .unwrap();

        assert_eq!(config.ranker.top_k, 3);
        assert_eq!(config.ranker.max_total_units, Some(12));
        assert_eq!(config.ranker.min_confidence, 0.15);
        assert_eq!(config.session.timeout_hours, 24);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn env_overrides_win_over_defaults() {
        let env = env_of(&[
            (ENV_TOP_K, "4"),
            (ENV_MIN_CONFIDENCE, "0.3"),
            (ENV_SESSION_TIMEOUT_HOURS, "48"),
            (ENV_MAX_TOTAL_UNITS, "20"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_FORMAT, "pretty"),
        ]);
        let config = ReorderConfig::load_with_env(no_file(), env).unwrap();

        assert_eq!(config.ranker.top_k, 4);
        assert_eq!(config.ranker.min_confidence, 0.3);
        assert_eq!(config.ranker.max_total_units, Some(20));
        assert_eq!(config.session.timeout_hours, 48);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn unparsable_env_override_is_reported_with_its_key() {
        let err = ReorderConfig::load_with_env(no_file(), env_of(&[(ENV_TOP_K, "many")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidEnvOverride { key, value } => {
                assert_eq!(key, ENV_TOP_K);
                assert_eq!(value, "many");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        for (key, value) in [
            (ENV_TOP_K, "0"),
            (ENV_MIN_CONFIDENCE, "1.5"),
            (ENV_FREQUENCY_SATURATION, "0"),
            (ENV_SESSION_TIMEOUT_HOURS, "0"),
            (ENV_SINGLE_PURCHASE_PRIOR, "-0.1"),
            (ENV_LOG_LEVEL, "chatty"),
        ] {
            let err = ReorderConfig::load_with_env(no_file(), env_of(&[(key, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{key}={value}: {err}");
        }
    }

    #[test]
    fn required_file_must_exist() {
        let options = LoadOptions {
            require_file: true,
            ..no_file()
        };
        let err = ReorderConfig::load_with_env(options, env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfigFile(_)));
    }
}
