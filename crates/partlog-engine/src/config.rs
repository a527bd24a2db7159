//! Configuration for the system logs
//!
//! The engine consumes these structs as-is; loading them (from a file, the
//! command line, ...) is up to the embedding process. Every struct derives
//! `Deserialize` with defaults, so a loader only has to name what it changes.
//!
//! A log kind is enabled exactly when it has an entry:
//!
//! ```json
//! {
//!     "part_log": { "database": "database_name", "table": "table_name" },
//!     "max_buffer_size": 100000
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use partlog_core::{DEFAULT_DATABASE, DEFAULT_FLUSH_INTERVAL_MS, LogKind, TableRef};

use crate::error::SystemLogError;

/// Records a single log may hold between flushes before dropping new ones
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1_048_576;

/// Upper bound for the final flush at shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Longest accepted flush interval (one hour)
pub const MAX_FLUSH_INTERVAL_MS: u64 = 3_600_000;

/// Longest accepted shutdown timeout (ten minutes)
pub const MAX_SHUTDOWN_TIMEOUT_MS: u64 = 600_000;

/// Whole milliseconds of `duration`, saturating at `u64::MAX`
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Settings for one log kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemLogConfig {
    /// Destination database
    pub database: String,
    /// Destination table, the kind's default name when unset
    pub table: Option<String>,
    /// Time between periodic flushes
    pub flush_interval_ms: u64,
}

impl Default for SystemLogConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            table: None,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
        }
    }
}

impl SystemLogConfig {
    /// Set the destination database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the destination table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the flush interval
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = duration_ms(interval);
        self
    }

    /// Destination table for `kind`
    pub fn destination(&self, kind: LogKind) -> TableRef {
        let table = self
            .table
            .clone()
            .unwrap_or_else(|| kind.default_table().to_string());
        TableRef::new(self.database.clone(), table)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    fn validate(&self, kind: LogKind) -> Result<(), SystemLogError> {
        self.destination(kind)
            .validate()
            .map_err(|e| SystemLogError::config(format!("{kind}: {e}")))?;

        if self.flush_interval_ms == 0 || self.flush_interval_ms > MAX_FLUSH_INTERVAL_MS {
            return Err(SystemLogError::config(format!(
                "{kind}: flush_interval_ms must be between 1 and {MAX_FLUSH_INTERVAL_MS}, got {}",
                self.flush_interval_ms
            )));
        }
        Ok(())
    }
}

/// Settings for all system logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemLogsConfig {
    /// Part lifecycle log, disabled when absent
    pub part_log: Option<SystemLogConfig>,
    /// Mutation log, disabled when absent
    pub mutation_log: Option<SystemLogConfig>,
    /// Buffer bound per log, in records
    pub max_buffer_size: usize,
    /// Upper bound for each log's final flush
    pub shutdown_timeout_ms: u64,
}

impl Default for SystemLogsConfig {
    fn default() -> Self {
        Self {
            part_log: None,
            mutation_log: None,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl SystemLogsConfig {
    /// Enable `kind` with `config`
    pub fn with_log(mut self, kind: LogKind, config: SystemLogConfig) -> Self {
        *self.slot(kind) = Some(config);
        self
    }

    /// Enable `kind` with default settings
    pub fn with_default_log(self, kind: LogKind) -> Self {
        self.with_log(kind, SystemLogConfig::default())
    }

    /// Set the per-log buffer bound
    pub fn with_max_buffer_size(mut self, max: usize) -> Self {
        self.max_buffer_size = max;
        self
    }

    /// Set the shutdown flush timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = duration_ms(timeout);
        self
    }

    /// Configuration entry for `kind`, if enabled
    pub fn entry(&self, kind: LogKind) -> Option<&SystemLogConfig> {
        match kind {
            LogKind::PartLog => self.part_log.as_ref(),
            LogKind::MutationLog => self.mutation_log.as_ref(),
        }
    }

    fn slot(&mut self, kind: LogKind) -> &mut Option<SystemLogConfig> {
        match kind {
            LogKind::PartLog => &mut self.part_log,
            LogKind::MutationLog => &mut self.mutation_log,
        }
    }

    pub fn is_enabled(&self, kind: LogKind) -> bool {
        self.entry(kind).is_some()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject anything the engine cannot run with
    pub fn validate(&self) -> Result<(), SystemLogError> {
        if self.max_buffer_size == 0 {
            return Err(SystemLogError::config("max_buffer_size must be positive"));
        }
        if self.shutdown_timeout_ms > MAX_SHUTDOWN_TIMEOUT_MS {
            return Err(SystemLogError::config(format!(
                "shutdown_timeout_ms must be at most {MAX_SHUTDOWN_TIMEOUT_MS}, got {}",
                self.shutdown_timeout_ms
            )));
        }
        for kind in LogKind::ALL {
            if let Some(entry) = self.entry(kind) {
                entry.validate(kind)?;
            }
        }
        Ok(())
    }
}
