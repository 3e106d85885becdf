//! Configuration types for the logging system

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive (overridden by RUST_LOG)
    pub default_level: String,

    /// Console output configuration
    pub console: ConsoleConfig,

    /// JSONL file output configuration
    pub file: Option<FileConfig>,

    /// JSONL formatting configuration
    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// Verbose human-readable console output, including per-decision events
    pub fn development() -> Self {
        Self {
            default_level: "vanet_strategy=debug,vanet_simulation=debug,info".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
            },
            ..Default::default()
        }
    }

    /// Warnings only, no colors
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: false,
            },
            ..Default::default()
        }
    }

    /// Quiet console plus a JSONL trace of every decision in `log_dir`
    pub fn recording(log_dir: PathBuf) -> Self {
        Self {
            default_level: "vanet_strategy=trace,info".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: false,
            },
            file: Some(FileConfig {
                directory: log_dir,
                ..FileConfig::default()
            }),
            jsonl: JsonlConfig::default(),
        }
    }

    /// Check the configuration for problems
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.default_level.trim().is_empty() {
            warnings.push("default_level is empty".to_string());
        }

        if !self.console.enabled && self.file.is_none() {
            warnings.push("no output enabled; all events are discarded".to_string());
        }

        if let Some(file) = &self.file
            && file.prefix.is_empty()
        {
            warnings.push("file prefix is empty".to_string());
        }

        warnings
    }

    /// Returns true if the configuration has no warnings
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Console output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable lines instead of JSONL
    pub pretty: bool,
    /// Include ANSI colors
    pub ansi: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: true,
            ansi: true,
        }
    }
}

/// JSONL file output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Directory for log files
    pub directory: PathBuf,
    /// File name prefix
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "vanet".to_string(),
            rotation: RotationStrategy::Never,
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RotationStrategy {
    /// Rotate daily
    Daily,
    /// Rotate hourly
    Hourly,
    /// One file per run, truncated on start
    #[default]
    Never,
}

/// JSONL formatting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonlConfig {
    /// Flatten event fields to root level
    pub flatten_events: bool,
    /// Include span list in events
    pub include_spans: bool,
    /// Include file/line information
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_location: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.default_level, "info");
        assert!(config.console.enabled);
        assert!(config.file.is_none());
        assert!(config.is_valid());
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(config.default_level.contains("vanet_strategy=debug"));
        assert!(config.console.pretty);
        assert!(config.console.ansi);
    }

    #[test]
    fn test_testing_config() {
        let config = LogConfig::testing();
        assert_eq!(config.default_level, "warn");
        assert!(!config.console.ansi);
    }

    #[test]
    fn test_recording_config() {
        let config = LogConfig::recording(PathBuf::from("/tmp/vanet-logs"));
        let file = config.file.as_ref().unwrap();
        assert_eq!(file.prefix, "vanet");
        assert_eq!(file.rotation, RotationStrategy::Never);
        assert!(config.is_valid());
    }

    #[test]
    fn test_validate_flags_silent_config() {
        let mut config = LogConfig::default();
        config.console.enabled = false;
        assert_eq!(config.validate().len(), 1);

        config.default_level = " ".to_string();
        assert_eq!(config.validate().len(), 2);
    }
}
