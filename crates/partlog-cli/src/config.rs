use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use partlog_engine::SystemLogsConfig;
use partlog_storage::CatalogConfig;

/// File name of the catalog inside a data directory
pub const CATALOG_FILE: &str = "partlog.redb";

#[derive(Parser)]
#[command(name = "partlog", about = "Simulate and query part lifecycle system tables")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a table workload with system logs enabled, then shut down
    Simulate {
        /// Directory holding the catalog
        #[arg(long)]
        data_dir: PathBuf,
        /// System logs configuration (JSON); every log is disabled without it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of inserts, each writing one part
        #[arg(long, default_value_t = 1)]
        inserts: usize,
        /// Merge all inserted parts into one at the end
        #[arg(long)]
        merge: bool,
        /// Mutate the resulting parts once
        #[arg(long)]
        mutate: bool,
        /// Database of the simulated table
        #[arg(long, default_value = "default")]
        database: String,
        /// Name of the simulated table
        #[arg(long, default_value = "test_table")]
        table: String,
        /// Create destination databases that do not exist yet
        #[arg(long)]
        create_databases: bool,
    },
    /// List tables of a database
    Tables {
        /// Directory holding the catalog
        #[arg(long)]
        data_dir: PathBuf,
        /// Database to list
        #[arg(long, default_value = "system")]
        database: String,
    },
    /// Print all rows of a system table as JSON lines
    Select {
        /// Directory holding the catalog
        #[arg(long)]
        data_dir: PathBuf,
        /// Database of the table
        #[arg(long, default_value = "system")]
        database: String,
        /// Table to read
        #[arg(long, default_value = "part_log")]
        table: String,
    },
}

/// Catalog location for a data directory
pub fn catalog_config(data_dir: &Path) -> CatalogConfig {
    CatalogConfig::with_path(data_dir.join(CATALOG_FILE))
}

/// Load system logs configuration from a JSON file
///
/// Without a file every log is disabled, the same as an empty configuration.
pub fn load_logs_config(path: Option<&Path>) -> anyhow::Result<SystemLogsConfig> {
    let Some(path) = path else {
        return Ok(SystemLogsConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: SystemLogsConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use partlog_core::LogKind;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_disables_logs() {
        let config = load_logs_config(None).unwrap();
        assert!(!config.is_enabled(LogKind::PartLog));
    }

    #[test]
    fn test_load_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs.json");
        std::fs::write(
            &path,
            r#"{ "part_log": { "database": "database_name", "table": "table_name" } }"#,
        )
        .unwrap();

        let config = load_logs_config(Some(&path)).unwrap();
        let entry = config.entry(LogKind::PartLog).unwrap();
        assert_eq!(entry.database, "database_name");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs.json");
        std::fs::write(&path, r#"{ "part_log": { "flush_interval_ms": 0 } }"#).unwrap();

        let err = load_logs_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("flush_interval_ms"));
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "partlog",
            "simulate",
            "--data-dir",
            "/tmp/d",
            "--inserts",
            "3",
            "--merge",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Simulate {
                inserts: 3,
                merge: true,
                ..
            }
        ));
        assert_eq!(cli.log_level, "warn");
    }
}
