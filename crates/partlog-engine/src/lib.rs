//! # PartLog Engine
//!
//! Buffered, asynchronous flush engine for structural-event logs.
//!
//! Storage engine code records part lifecycle events (new parts, merges,
//! mutations, downloads, removals, moves) without ever waiting on I/O. Each
//! enabled log kind owns a bounded buffer and a background tokio task that
//! periodically drains it into a queryable system table.
//!
//! ## Features
//!
//! - **Fire-and-forget producers**: [`SystemLogs::emit`] only takes a mutex
//!   around a `Vec::push`
//! - **Per-kind flush tasks**: independent timers, one batch insert per cycle
//! - **Lazy table creation**: the destination is created on first flush,
//!   concurrent creators are reconciled by the store
//! - **At-most-once delivery**: overflowing buffers drop new records, failed
//!   batches are dropped and logged, never retried
//! - **Bounded shutdown**: one final flush per kind, capped by a timeout
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use partlog_core::{LogKind, PartLogElement};
//! use partlog_engine::{SystemLogs, SystemLogsConfig};
//! use partlog_storage::Catalog;
//!
//! let catalog = Arc::new(Catalog::open_in_memory()?);
//! let config = SystemLogsConfig::default().with_default_log(LogKind::PartLog);
//! let logs = SystemLogs::start(config, catalog)?;
//!
//! logs.emit(LogKind::PartLog, PartLogElement::new_part("db", "hits", "all_1_1_0"));
//! logs.flush(LogKind::PartLog).await?;
//! logs.shutdown().await;
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod global;
pub mod log;
pub mod part_log;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod stats;

pub use buffer::{EventBuffer, PushOutcome};
pub use config::{
    DEFAULT_MAX_BUFFER_SIZE, DEFAULT_SHUTDOWN_TIMEOUT_MS, MAX_FLUSH_INTERVAL_MS,
    MAX_SHUTDOWN_TIMEOUT_MS, SystemLogConfig, SystemLogsConfig,
};
pub use error::{SystemLogError, SystemLogResult};
pub use log::SystemLog;
pub use part_log::{MergeStats, OperationTimer, PartInfo, PartLogWriter};
pub use registry::SystemLogs;
pub use resolver::{DestinationResolver, Resolution};
pub use scheduler::{FlushOutcome, FlushReport, FlushState};
pub use stats::SystemLogStats;
