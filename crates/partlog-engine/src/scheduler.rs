//! Background flush task, one per enabled log kind
//!
//! The task owns the periodic timer and is the only consumer of its log's
//! buffer. It reacts to three things:
//! - a timer tick: drain and insert
//! - a flush request: the same, out of cycle, with a report sent back
//! - the shutdown signal: one last flush, then stop
//!
//! Shutdown is bounded by the shutdown timeout as a whole. A flush already in
//! flight when the signal arrives shares that deadline with the final flush.
//!
//! ## Failure policy
//!
//! A failed insert drops the batch. Records are never requeued and there is
//! no immediate retry; the next natural tick starts from an empty slate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use partlog_core::{LogElement, LogKind, TableRef};
use partlog_storage::StorageError;

use crate::buffer::EventBuffer;
use crate::config::duration_ms;
use crate::resolver::DestinationResolver;
use crate::stats::LogCounters;

/// Where a log's flush task is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlushState {
    Idle = 0,
    Flushing = 1,
    ShutdownFlush = 2,
    Stopped = 3,
}

#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(FlushState::Idle as u8))
    }

    pub fn get(&self) -> FlushState {
        match self.0.load(Ordering::Acquire) {
            0 => FlushState::Idle,
            1 => FlushState::Flushing,
            2 => FlushState::ShutdownFlush,
            _ => FlushState::Stopped,
        }
    }

    fn set(&self, state: FlushState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// What a single flush did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// One batch insert of `rows` records
    Inserted { rows: usize, created_table: bool },
    /// Nothing was buffered; no insert was issued
    Empty,
    /// The log is disabled; nothing is ever buffered for it
    Disabled,
    /// The insert failed or timed out and the batch was dropped
    Failed { dropped: usize, reason: String },
}

/// Result of a flush, as returned to admin callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub kind: LogKind,
    pub outcome: FlushOutcome,
}

impl FlushReport {
    /// Rows that reached the destination
    pub fn rows(&self) -> usize {
        match self.outcome {
            FlushOutcome::Inserted { rows, .. } => rows,
            _ => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, FlushOutcome::Failed { .. })
    }
}

/// Reply channel of an out-of-cycle flush
pub(crate) type FlushRequest = oneshot::Sender<FlushReport>;

/// Background flush task
pub(crate) struct FlushScheduler<T: LogElement> {
    kind: LogKind,
    destination: TableRef,
    buffer: Arc<EventBuffer<T>>,
    resolver: Arc<DestinationResolver>,
    counters: Arc<LogCounters>,
    state: Arc<StateCell>,
    /// Out-of-cycle flush requests
    requests: mpsc::Receiver<FlushRequest>,
    shutdown_timeout: Duration,
}

impl<T: LogElement> FlushScheduler<T> {
    #[allow(clippy::too_many_arguments)] // Constructor with many dependencies
    pub fn new(
        kind: LogKind,
        destination: TableRef,
        buffer: Arc<EventBuffer<T>>,
        resolver: Arc<DestinationResolver>,
        counters: Arc<LogCounters>,
        state: Arc<StateCell>,
        requests: mpsc::Receiver<FlushRequest>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            kind,
            destination,
            buffer,
            resolver,
            counters,
            state,
            requests,
            shutdown_timeout,
        }
    }

    /// Spawn the task on `runtime`; it stops once `shutdown_rx` fires
    pub fn spawn(
        self,
        shutdown_rx: broadcast::Receiver<()>,
        runtime: &tokio::runtime::Handle,
    ) -> JoinHandle<()> {
        runtime.spawn(self.run(shutdown_rx))
    }

    async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.resolver.flush_interval();
        info!(
            kind = %self.kind,
            table = %self.destination,
            interval_ms = duration_ms(period),
            "Flush scheduler started"
        );

        // First tick one full period after start, not immediately
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let interrupted = loop {
            let reply = tokio::select! {
                _ = shutdown_rx.recv() => break None,
                Some(reply) = self.requests.recv() => Some(reply),
                _ = interval.tick() => None,
            };

            let (report, interrupted) = self.flush_cycle(&mut shutdown_rx).await;
            if let Some(reply) = reply {
                let _ = reply.send(report);
            }
            if interrupted.is_some() {
                break interrupted;
            }
        };

        debug!(kind = %self.kind, "Flush scheduler received shutdown");
        let deadline = interrupted.unwrap_or_else(|| self.shutdown_deadline());
        self.shutdown_flush(deadline).await;
    }

    /// One IDLE -> FLUSHING -> IDLE cycle
    ///
    /// A shutdown signalled while the insert is in flight gives the insert
    /// until the shutdown deadline; past that the batch is dropped. The
    /// deadline is returned so the final flush stays within the same bound.
    async fn flush_cycle(
        &self,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> (FlushReport, Option<Instant>) {
        self.state.set(FlushState::Flushing);
        let batch = self.buffer.drain();
        let rows = batch.len();

        let write = self.write(batch);
        tokio::pin!(write);
        let (outcome, interrupted) = tokio::select! {
            outcome = &mut write => (outcome, None),
            _ = shutdown_rx.recv() => {
                let deadline = self.shutdown_deadline();
                let outcome = match tokio::time::timeout_at(deadline, &mut write).await {
                    Ok(outcome) => outcome,
                    Err(_) => self.abandon(rows, "flush in progress at shutdown timed out"),
                };
                (outcome, Some(deadline))
            }
        };

        if interrupted.is_none() {
            self.state.set(FlushState::Idle);
        }
        let report = FlushReport {
            kind: self.kind,
            outcome,
        };
        (report, interrupted)
    }

    fn shutdown_deadline(&self) -> Instant {
        // Bounded by MAX_SHUTDOWN_TIMEOUT_MS at validation
        Instant::now() + self.shutdown_timeout
    }

    /// Final flush, bounded by `deadline`
    async fn shutdown_flush(&mut self, deadline: Instant) {
        self.state.set(FlushState::ShutdownFlush);

        // Requests that raced with shutdown are answered by the final flush
        let mut waiting = Vec::new();
        while let Ok(reply) = self.requests.try_recv() {
            waiting.push(reply);
        }

        let batch = self.buffer.drain();
        let rows = batch.len();
        let outcome = match tokio::time::timeout_at(deadline, self.write(batch)).await {
            Ok(outcome) => outcome,
            Err(_) => self.abandon(rows, "shutdown flush timed out"),
        };

        let report = FlushReport {
            kind: self.kind,
            outcome,
        };
        for reply in waiting {
            let _ = reply.send(report.clone());
        }

        self.state.set(FlushState::Stopped);
        info!(kind = %self.kind, outcome = ?report.outcome, "Flush scheduler stopped");
    }

    /// Count a batch whose insert missed the shutdown deadline as dropped
    ///
    /// The blocking insert itself cannot be cancelled and may still land.
    fn abandon(&self, rows: usize, reason: &'static str) -> FlushOutcome {
        LogCounters::add(&self.counters.dropped_failed, rows);
        warn!(
            kind = %self.kind,
            table = %self.destination,
            rows,
            timeout_ms = duration_ms(self.shutdown_timeout),
            reason,
            "Shutdown deadline passed, discarding batch"
        );
        FlushOutcome::Failed {
            dropped: rows,
            reason: reason.to_string(),
        }
    }

    /// Insert a drained batch as a single write
    async fn write(&self, batch: Vec<T>) -> FlushOutcome {
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let rows = batch.len();
        let resolver = Arc::clone(&self.resolver);
        let target = self.destination.clone();
        // redb is synchronous; keep it off the async workers
        let result =
            tokio::task::spawn_blocking(move || write_batch(&resolver, &target, &batch)).await;

        match result {
            Ok(Ok(created_table)) => {
                LogCounters::add(&self.counters.flushed_rows, rows);
                LogCounters::add(&self.counters.flushes, 1);
                debug!(kind = %self.kind, table = %self.destination, rows, "Flushed batch");
                FlushOutcome::Inserted {
                    rows,
                    created_table,
                }
            }
            Ok(Err(e)) => self.fail(rows, e.to_string()),
            Err(e) => self.fail(rows, format!("flush task failed: {e}")),
        }
    }

    fn fail(&self, rows: usize, reason: String) -> FlushOutcome {
        LogCounters::add(&self.counters.failed_flushes, 1);
        LogCounters::add(&self.counters.dropped_failed, rows);
        error!(
            kind = %self.kind,
            table = %self.destination,
            rows,
            error = %reason,
            "Flush failed, dropping batch"
        );
        FlushOutcome::Failed {
            dropped: rows,
            reason,
        }
    }
}

/// Ensure the table and insert; returns whether the table was created
fn write_batch<T: LogElement>(
    resolver: &DestinationResolver,
    table: &TableRef,
    batch: &[T],
) -> Result<bool, StorageError> {
    let schema = T::schema();
    let created = resolver
        .ensure_table(&schema)?
        .is_some_and(|outcome| outcome.is_new());

    let rows = batch
        .iter()
        .map(|record| {
            postcard::to_allocvec(record).map_err(|e| StorageError::serialization(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match resolver.store().insert_encoded(table, &schema, &rows) {
        Ok(_) => Ok(created),
        Err(e) => {
            if e.is_not_found() {
                resolver.invalidate();
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_transitions() {
        let state = StateCell::new();
        assert_eq!(state.get(), FlushState::Idle);

        for next in [
            FlushState::Flushing,
            FlushState::Idle,
            FlushState::ShutdownFlush,
            FlushState::Stopped,
        ] {
            state.set(next);
            assert_eq!(state.get(), next);
        }
    }

    #[test]
    fn test_report_rows() {
        let inserted = FlushReport {
            kind: LogKind::PartLog,
            outcome: FlushOutcome::Inserted {
                rows: 12,
                created_table: false,
            },
        };
        assert_eq!(inserted.rows(), 12);
        assert!(!inserted.is_failure());

        let failed = FlushReport {
            kind: LogKind::MutationLog,
            outcome: FlushOutcome::Failed {
                dropped: 12,
                reason: "Database later doesn't exist".to_string(),
            },
        };
        assert_eq!(failed.rows(), 0);
        assert!(failed.is_failure());
    }
}
