//! Configuration loading and validation
//! Sections mirror the `[tail]`, `[notification]` and `[logging]` tables

use std::path::Path;

use anyhow::{Context, Result};
use notify_tail_core::{TailError, DEFAULT_LINE_BUFFER_SIZE};
use notify_tail_system::{
    Urgency, DEFAULT_EVENT_BUFFER_SIZE, DEFAULT_MAX_SOURCE_ERRORS, MIN_EVENT_BUFFER_SIZE,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    pub tail: TailSettings,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
}

/// Buffering and event loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailSettings {
    /// Line buffer capacity per file; longer lines are split
    pub line_buffer_size: usize,
    /// Read buffer for one batch of kernel events
    pub event_buffer_size: usize,
    /// Consecutive event source failures before exiting
    pub max_source_errors: u32,
    /// Show content already present in files at startup
    pub from_start: bool,
}

/// Where and how lines are shown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub app_name: String,
    pub urgency: Urgency,
    pub timeout_ms: u64,
    pub sink: SinkKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Desktop notification via notify-send
    #[default]
    Desktop,
    /// One line per notification on standard output
    Stdout,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
    Json,
}

impl Default for TailSettings {
    fn default() -> Self {
        Self {
            line_buffer_size: DEFAULT_LINE_BUFFER_SIZE,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            max_source_errors: DEFAULT_MAX_SOURCE_ERRORS,
            from_start: false,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            app_name: "notify-tail".to_string(),
            urgency: Urgency::Low,
            timeout_ms: 10_000,
            sink: SinkKind::Desktop,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

impl TailConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: TailConfig = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), TailError> {
        if self.tail.line_buffer_size < 2 {
            return Err(TailError::InvalidConfig(format!(
                "line_buffer_size must be at least 2, got {}",
                self.tail.line_buffer_size
            )));
        }

        if self.tail.event_buffer_size < MIN_EVENT_BUFFER_SIZE {
            return Err(TailError::InvalidConfig(format!(
                "event_buffer_size must be at least {}, got {}",
                MIN_EVENT_BUFFER_SIZE, self.tail.event_buffer_size
            )));
        }

        if self.tail.max_source_errors == 0 {
            return Err(TailError::InvalidConfig(
                "max_source_errors must be > 0".to_string(),
            ));
        }

        if self.notification.app_name.trim().is_empty() {
            return Err(TailError::InvalidConfig(
                "notification.app_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_load_partial_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let config_toml = r#"
[tail]
line_buffer_size = 1024

[notification]
urgency = "critical"
sink = "stdout"

[logging]
format = "json"
"#;

        temp_file.write_all(config_toml.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = TailConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.tail.line_buffer_size, 1024);
        assert_eq!(config.tail.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.notification.urgency, Urgency::Critical);
        assert_eq!(config.notification.sink, SinkKind::Stdout);
        assert_eq!(config.notification.timeout_ms, 10_000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = TailConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tail.line_buffer_size, 4096);
        assert!(!config.tail.from_start);
        assert_eq!(config.notification.urgency, Urgency::Low);
    }

    #[test]
    fn test_dumped_config_loads_back() {
        let config = TailConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[notification]"));
        let parsed: TailConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = TailConfig::default();
        config.tail.line_buffer_size = 1;
        assert!(matches!(config.validate(), Err(TailError::InvalidConfig(_))));

        let mut config = TailConfig::default();
        config.tail.event_buffer_size = 64;
        assert!(config.validate().is_err());

        let mut config = TailConfig::default();
        config.tail.max_source_errors = 0;
        assert!(config.validate().is_err());

        let mut config = TailConfig::default();
        config.notification.app_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_sink_is_rejected() {
        let result: Result<TailConfig, _> = toml::from_str("[notification]\nsink = \"pager\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TailConfig::load_from_file(dir.path().join("absent.toml")).is_err());
    }
}
