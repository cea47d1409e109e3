//! Tracing and logging setup shared by every binary in the workspace.

/// Initialize process-wide tracing with default settings.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&LoggingConfig::default());
}

/// Initialize process-wide tracing from explicit settings.
pub fn init_with(config: &LoggingConfig) {
    tracing::init(config);
}

/// Logging configuration (level, output format).
pub mod logging;

/// Tracing subscriber installation.
pub mod tracing;

pub use logging::{LogFormat, LoggingConfig, LoggingConfigError};
