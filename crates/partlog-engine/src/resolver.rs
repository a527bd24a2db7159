//! Destination table resolution
//!
//! Maps a log kind to the table its records go to, and makes sure that
//! table exists before the first insert: a read-only exists-check first, then
//! the store's idempotent create-if-not-exists only when the table is missing
//! or has an outdated schema. The resolver remembers success so later flushes
//! skip both.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use partlog_core::{LogKind, TableRef, TableSchema};
use partlog_storage::{CreateOutcome, StorageError, SystemTableStore};

use crate::config::SystemLogConfig;

/// Where records of a kind go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Table(TableRef),
    /// No configuration entry: records are discarded
    Disabled,
}

/// Destination state for one log kind
///
/// Immutable after construction apart from `created`, which only ever moves
/// from false to true (or back, if the table disappears underneath us).
pub struct DestinationResolver {
    kind: LogKind,
    destination: Option<TableRef>,
    flush_interval: Duration,
    created: AtomicBool,
    store: Arc<dyn SystemTableStore>,
}

impl DestinationResolver {
    /// Build from the kind's configuration entry; `None` means disabled
    pub fn new(
        kind: LogKind,
        config: Option<&SystemLogConfig>,
        store: Arc<dyn SystemTableStore>,
    ) -> Self {
        let default_interval = Duration::from_millis(kind.default_flush_interval_ms());
        Self {
            kind,
            destination: config.map(|c| c.destination(kind)),
            flush_interval: config.map_or(default_interval, SystemLogConfig::flush_interval),
            created: AtomicBool::new(false),
            store,
        }
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    pub fn resolve(&self) -> Resolution {
        match &self.destination {
            Some(table) => Resolution::Table(table.clone()),
            None => Resolution::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.destination.is_some()
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Whether this resolver has seen its table exist
    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    pub fn store(&self) -> &Arc<dyn SystemTableStore> {
        &self.store
    }

    /// Make sure the destination table exists; blocking
    ///
    /// Returns the creation outcome the first time the table is confirmed,
    /// `None` when it was already known to exist or the kind is disabled.
    /// `Created`, `AlreadyExists` and `Recreated` all count as success, so
    /// two kinds sharing one destination can both get here first.
    pub fn ensure_table(&self, schema: &TableSchema) -> Result<Option<CreateOutcome>, StorageError> {
        let Some(table) = &self.destination else {
            return Ok(None);
        };
        if self.is_created() {
            return Ok(None);
        }

        let outcome = match self.store.table_schema(table)? {
            Some(existing) if existing == *schema => CreateOutcome::AlreadyExists,
            _ => self.store.create_table_if_not_exists(table, schema)?,
        };
        if self
            .created
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            match &outcome {
                CreateOutcome::AlreadyExists => {
                    debug!(kind = %self.kind, table = %table, "Destination table already exists")
                }
                _ => info!(kind = %self.kind, table = %table, outcome = ?outcome, "Prepared destination table"),
            }
        }
        Ok(Some(outcome))
    }

    /// Forget that the table exists, so the next flush creates it again
    pub fn invalidate(&self) {
        if self.created.swap(false, Ordering::AcqRel) {
            debug!(kind = %self.kind, "Destination table vanished, will recreate");
        }
    }
}
