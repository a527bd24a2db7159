//! Logging configuration
//!
//! Deserializable so a process can carry it in its own config file; every
//! field has a default, so `{}` is a valid configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for every target without an override; `RUST_LOG` replaces both
    pub level: String,
    /// Per-target levels, e.g. `partlog_storage = "debug"`
    pub targets: BTreeMap<String, String>,
    pub console: ConsoleConfig,
    /// JSONL file output, off when unset
    pub file: Option<FileConfig>,
    /// Context attached to every JSON event
    pub json: JsonFields,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            targets: BTreeMap::new(),
            console: ConsoleConfig::default(),
            file: None,
            json: JsonFields::default(),
        }
    }
}

impl LogConfig {
    /// Human-readable output on stderr, leaving stdout to command output
    pub fn cli(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            console: ConsoleConfig {
                format: ConsoleFormat::Pretty,
                ansi: true,
                stderr: true,
            },
            ..Self::default()
        }
    }

    /// Warnings and errors only, as plain JSON lines
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            ..Self::default()
        }
    }

    /// Override the level of one target
    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.targets.insert(target.into(), level.into());
        self
    }

    /// `EnvFilter` directives: the base level, then each override
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.level.clone())
            .chain(
                self.targets
                    .iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// How console events are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleFormat {
    /// One JSON object per line
    #[default]
    Json,
    Pretty,
    /// No console output
    Off,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub format: ConsoleFormat,
    /// Colors, pretty format only
    pub ansi: bool,
    /// Write to stderr instead of stdout
    pub stderr: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name before the date suffix and `.log`
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Rotated files to keep; unlimited when unset
    pub max_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "partlog".to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// One file, truncated when logging starts
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFields {
    /// Current span and span list
    pub spans: bool,
    /// Source file and line
    pub location: bool,
    /// Thread id and name
    pub threads: bool,
}

impl Default for JsonFields {
    fn default() -> Self {
        Self {
            spans: true,
            location: true,
            threads: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.console.format, ConsoleFormat::Json);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_cli_config() {
        let config = LogConfig::cli("debug");
        assert_eq!(config.level, "debug");
        assert_eq!(config.console.format, ConsoleFormat::Pretty);
        assert!(config.console.stderr);
    }

    #[test]
    fn test_filter_directives() {
        let config = LogConfig::testing()
            .with_target("partlog_storage", "debug")
            .with_target("partlog_engine::scheduler", "trace");
        assert_eq!(
            config.filter_directives(),
            "warn,partlog_engine::scheduler=trace,partlog_storage=debug"
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LogConfig = serde_json::from_str(
            r#"{ "level": "debug", "console": { "format": "off" }, "file": { "directory": "/tmp/logs", "rotation": "hourly" } }"#,
        )
        .unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.console.format, ConsoleFormat::Off);
        let file = config.file.unwrap();
        assert_eq!(file.rotation, RotationStrategy::Hourly);
        assert_eq!(file.prefix, "partlog");
        assert!(config.json.spans);
    }
}
