//! Registry of all system logs and their lifecycle
//!
//! [`SystemLogs`] is built once from configuration and stays immutable
//! afterwards: one [`SystemLog`] per enabled kind, one resolver per kind
//! (enabled or not). Producers only ever look up a map entry and push into a
//! buffer.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use partlog_core::{LogKind, PartLogElement};
use partlog_storage::SystemTableStore;

use crate::config::{SystemLogsConfig, duration_ms};
use crate::error::{SystemLogError, SystemLogResult};
use crate::log::SystemLog;
use crate::resolver::{DestinationResolver, Resolution};
use crate::scheduler::{FlushOutcome, FlushReport};
use crate::stats::SystemLogStats;

/// All system logs of a process
pub struct SystemLogs {
    config: SystemLogsConfig,
    logs: HashMap<LogKind, SystemLog<PartLogElement>>,
    resolvers: HashMap<LogKind, Arc<DestinationResolver>>,
    /// Records emitted to kinds without a configuration entry
    disabled_drops: HashMap<LogKind, AtomicU64>,
    shutdown_tx: broadcast::Sender<()>,
    shut_down: AtomicBool,
}

impl SystemLogs {
    /// Validate `config` and start one flush task per enabled kind
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(config, store), fields(
        part_log = config.is_enabled(LogKind::PartLog),
        mutation_log = config.is_enabled(LogKind::MutationLog),
    ))]
    pub fn start(
        config: SystemLogsConfig,
        store: Arc<dyn SystemTableStore>,
    ) -> SystemLogResult<Arc<Self>> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SystemLogError::Runtime(e.to_string()))?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let mut logs = HashMap::new();
        let mut resolvers = HashMap::new();
        let mut disabled_drops = HashMap::new();

        for kind in LogKind::ALL {
            let resolver = Arc::new(DestinationResolver::new(
                kind,
                config.entry(kind),
                Arc::clone(&store),
            ));

            match SystemLog::start(
                Arc::clone(&resolver),
                config.max_buffer_size,
                shutdown_tx.subscribe(),
                config.shutdown_timeout(),
                &runtime,
            ) {
                Some(log) => {
                    info!(
                        kind = %kind,
                        table = %log.destination(),
                        interval_ms = duration_ms(resolver.flush_interval()),
                        "System log enabled"
                    );
                    logs.insert(kind, log);
                }
                None => debug!(kind = %kind, "System log disabled"),
            }

            disabled_drops.insert(kind, AtomicU64::new(0));
            resolvers.insert(kind, resolver);
        }

        Ok(Arc::new(Self {
            config,
            logs,
            resolvers,
            disabled_drops,
            shutdown_tx,
            shut_down: AtomicBool::new(false),
        }))
    }

    /// Record a structural event; fire-and-forget
    ///
    /// Never blocks on I/O and never fails. Records for a disabled kind, or
    /// emitted after shutdown, are discarded.
    pub fn emit(&self, kind: LogKind, record: PartLogElement) {
        match self.logs.get(&kind) {
            Some(log) => {
                log.add(record);
            }
            None => {
                if let Some(counter) = self.disabled_drops.get(&kind) {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Whether `kind` has a configuration entry
    pub fn is_enabled(&self, kind: LogKind) -> bool {
        self.logs.contains_key(&kind)
    }

    /// The running log for `kind`, if enabled
    pub fn log(&self, kind: LogKind) -> Option<&SystemLog<PartLogElement>> {
        self.logs.get(&kind)
    }

    /// Where records of `kind` go
    pub fn resolve(&self, kind: LogKind) -> Resolution {
        self.resolvers
            .get(&kind)
            .map_or(Resolution::Disabled, |r| r.resolve())
    }

    /// Flush `kind` now and wait for the insert
    pub async fn flush(&self, kind: LogKind) -> SystemLogResult<FlushReport> {
        if self.is_shut_down() {
            return Err(SystemLogError::ShutDown);
        }
        let log = self
            .logs
            .get(&kind)
            .ok_or(SystemLogError::NotConfigured(kind))?;
        log.flush().await
    }

    /// Flush every enabled kind
    ///
    /// Requests go out to all kinds before any reply is awaited, so the
    /// flushes run concurrently. Disabled kinds report `Disabled`.
    pub async fn flush_all(&self) -> SystemLogResult<Vec<FlushReport>> {
        if self.is_shut_down() {
            return Err(SystemLogError::ShutDown);
        }

        let mut pending = Vec::with_capacity(LogKind::ALL.len());
        for kind in LogKind::ALL {
            match self.logs.get(&kind) {
                Some(log) => pending.push((kind, Some(log.request_flush().await?))),
                None => pending.push((kind, None)),
            }
        }

        let mut reports = Vec::with_capacity(pending.len());
        for (kind, reply) in pending {
            let report = match reply {
                Some(reply) => reply.await.map_err(|_| SystemLogError::ShutDown)?,
                None => FlushReport {
                    kind,
                    outcome: FlushOutcome::Disabled,
                },
            };
            reports.push(report);
        }
        Ok(reports)
    }

    /// Counter snapshot for `kind`
    pub fn stats(&self, kind: LogKind) -> SystemLogStats {
        let mut stats = self.logs.get(&kind).map(SystemLog::stats).unwrap_or_default();
        if let Some(counter) = self.disabled_drops.get(&kind) {
            stats.dropped_disabled += counter.load(Ordering::Relaxed);
        }
        stats
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop all flush tasks after one final flush each
    ///
    /// Idempotent. Each final flush is bounded by the shutdown timeout, so
    /// this returns within roughly that bound even if storage hangs.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return; // Already shut down
        }

        for log in self.logs.values() {
            log.close();
        }

        // Signal shutdown
        let _ = self.shutdown_tx.send(());

        // Wait for the final flushes
        for log in self.logs.values() {
            log.join().await;
        }

        info!("System logs stopped");
    }

    pub fn config(&self) -> &SystemLogsConfig {
        &self.config
    }
}

impl std::fmt::Debug for SystemLogs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemLogs")
            .field("logs", &self.logs.values().collect::<Vec<_>>())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
