//! Structured logging setup for PartLog processes
//!
//! Every PartLog crate logs through `tracing` macros with structured fields
//! (`kind`, `table`, `rows`, ...). This crate owns the one place where those
//! events are turned into output: a console layer (JSONL or pretty), an
//! optional JSONL file layer with rotation, and an `EnvFilter` built from the
//! configured levels.
//!
//! # Usage
//!
//! ```ignore
//! use partlog_logging::{LogConfig, PartlogSubscriberBuilder};
//!
//! let _guard = PartlogSubscriberBuilder::new()
//!     .with_config(LogConfig::cli("info"))
//!     .init();
//! ```
//!
//! The returned guard flushes the file writer when dropped; keep it alive
//! for as long as the process logs.

pub mod config;
pub mod error;

pub use config::{
    ConsoleConfig, ConsoleFormat, FileConfig, JsonFields, LogConfig, RotationStrategy,
};
pub use error::LoggingError;

use std::fs::{self, File};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builds and installs the global subscriber
#[derive(Debug, Clone, Default)]
pub struct PartlogSubscriberBuilder {
    config: LogConfig,
}

impl PartlogSubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the base level, keeping target overrides
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber, reporting failures on stderr
    ///
    /// Returns the file writer guard, if file output is configured.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }

    /// Install the subscriber
    ///
    /// Fails if the filter does not parse, the log directory cannot be
    /// created, or a global subscriber has already been set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.filter_directives())
                .map_err(|e| LoggingError::Filter(e.to_string()))?,
        };

        let console = &self.config.console;
        let fields = self.config.json;
        let mut layers: Vec<BoxedLayer> = Vec::new();

        let console_writer = if console.stderr {
            BoxMakeWriter::new(std::io::stderr)
        } else {
            BoxMakeWriter::new(std::io::stdout)
        };
        match console.format {
            ConsoleFormat::Pretty => layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(console_writer)
                    .with_ansi(console.ansi)
                    .with_target(true)
                    .with_thread_ids(fields.threads)
                    .boxed(),
            ),
            ConsoleFormat::Json => layers.push(json_layer(fields, console_writer)),
            ConsoleFormat::Off => {}
        }

        let guard = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                layers.push(json_layer(fields, writer));
                Some(guard)
            }
            None => None,
        };

        Registry::default()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }
}

/// JSON lines with event fields at the top level
fn json_layer<W>(fields: JsonFields, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(fields.spans)
        .with_span_list(fields.spans)
        .with_thread_ids(fields.threads)
        .with_thread_names(fields.threads)
        .with_file(fields.location)
        .with_line_number(fields.location)
        .with_writer(writer)
        .boxed()
}

/// Non-blocking writer for file output
///
/// `Never` truncates a single `<prefix>.log`; the rolling strategies append
/// to date-suffixed files and prune beyond `max_files`.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            let file = File::create(path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Install the testing subscriber
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = PartlogSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
