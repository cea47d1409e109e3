use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoggingConfigError {
    #[error("unsupported log format `{0}` (expected compact|pretty|json)")]
    UnsupportedFormat(String),

    #[error("logging.level must be one of trace|debug|info|warn|error, got `{0}`")]
    UnsupportedLevel(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    #[default]
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = LoggingConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(LoggingConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Level and format for the process subscriber. `RUST_LOG` still wins over `level`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), LoggingConfigError> {
        let level = self.level.trim().to_ascii_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(LoggingConfigError::UnsupportedLevel(self.level.clone())),
        }
    }
}
