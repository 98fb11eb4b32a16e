//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - spindle.toml (default configuration)
//! - spindle.local.toml (git-ignored local overrides)
//! - Environment variables (SPINDLE_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # spindle.toml
//! [codec]
//! lazy_field_threshold = 16
//! spill_threshold = 8192
//! verify_writes = true
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! SPINDLE_CODEC__VERIFY_WRITES=true
//! SPINDLE_LOGGING__LEVEL=trace
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Codec tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Records and arrays with at least this many schema-declared positions
    /// decode lazily. 0 = never lazy.
    #[serde(default = "default_lazy_field_threshold")]
    pub lazy_field_threshold: usize,

    /// Array builders switch to spilled storage past this many elements.
    /// 0 = never spill.
    #[serde(default = "default_spill_threshold")]
    pub spill_threshold: usize,

    /// Check values against the schema before specialized writes
    #[serde(default)]
    pub verify_writes: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error,
    /// or e.g. "spindle::codec=trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default)]
    pub format: LogFormat,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

// Default value functions
fn default_lazy_field_threshold() -> usize {
    8
}
fn default_spill_threshold() -> usize {
    4096
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. spindle.toml (base configuration)
    /// 2. spindle.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (SPINDLE_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("spindle.toml"))
            .merge(Toml::file("spindle.local.toml"))
            .merge(Env::prefixed("SPINDLE_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SPINDLE_").split("__"))
            .extract()
    }

    /// Create default configuration
    pub fn default() -> Self {
        Config {
            codec: CodecConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default()
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            lazy_field_threshold: default_lazy_field_threshold(),
            spill_threshold: default_spill_threshold(),
            verify_writes: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codec_config() {
        let config = Config::default();
        assert_eq!(config.codec.lazy_field_threshold, 8);
        assert_eq!(config.codec.spill_threshold, 4096);
        assert!(!config.codec.verify_writes);
    }

    #[test]
    fn test_default_logging_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();

        assert!(toml_str.contains("[codec]"));
        assert!(toml_str.contains("[logging]"));
        assert!(toml_str.contains("format = \"text\""));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = Config::default();
        config.codec.verify_writes = true;
        config.logging.format = LogFormat::Json;
        let toml_str = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.codec, config.codec);
        assert_eq!(back.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let back: Config = toml::from_str("[codec]\nspill_threshold = 0\n").unwrap();
        assert_eq!(back.codec.spill_threshold, 0);
        assert_eq!(back.codec.lazy_field_threshold, 8);
        assert_eq!(back.logging.level, "info");
    }

    #[test]
    fn test_log_format_serde() {
        let json = serde_json::to_string(&LogFormat::Text).unwrap();
        assert_eq!(json, "\"text\"");
        let json = serde_json::to_string(&LogFormat::Json).unwrap();
        assert_eq!(json, "\"json\"");
    }
}
