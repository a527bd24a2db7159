//! One running system log: buffer, destination and flush task

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

use partlog_core::{LogElement, LogKind, TableRef};

use crate::buffer::{EventBuffer, PushOutcome};
use crate::error::{SystemLogError, SystemLogResult};
use crate::resolver::{DestinationResolver, Resolution};
use crate::scheduler::{FlushReport, FlushRequest, FlushScheduler, FlushState, StateCell};
use crate::stats::{LogCounters, SystemLogStats};

/// Queued admin flushes per log
const FLUSH_REQUEST_CAPACITY: usize = 64;

/// A configured log kind and its background flush task
pub struct SystemLog<T: LogElement> {
    kind: LogKind,
    destination: TableRef,
    buffer: Arc<EventBuffer<T>>,
    resolver: Arc<DestinationResolver>,
    counters: Arc<LogCounters>,
    state: Arc<StateCell>,
    requests: mpsc::Sender<FlushRequest>,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<T: LogElement> SystemLog<T> {
    /// Build the log and spawn its flush task on `runtime`
    ///
    /// Returns `None` for a disabled resolver: disabled kinds get no buffer
    /// and no task.
    pub(crate) fn start(
        resolver: Arc<DestinationResolver>,
        max_buffer_size: usize,
        shutdown_rx: broadcast::Receiver<()>,
        shutdown_timeout: Duration,
        runtime: &tokio::runtime::Handle,
    ) -> Option<Self> {
        let destination = match resolver.resolve() {
            Resolution::Table(table) => table,
            Resolution::Disabled => return None,
        };
        let kind = resolver.kind();
        let buffer = Arc::new(EventBuffer::new(max_buffer_size));
        let counters = Arc::new(LogCounters::default());
        let state = Arc::new(StateCell::new());
        let (requests, requests_rx) = mpsc::channel(FLUSH_REQUEST_CAPACITY);

        let task = FlushScheduler::new(
            kind,
            destination.clone(),
            Arc::clone(&buffer),
            Arc::clone(&resolver),
            Arc::clone(&counters),
            Arc::clone(&state),
            requests_rx,
            shutdown_timeout,
        )
        .spawn(shutdown_rx, runtime);

        Some(Self {
            kind,
            destination,
            buffer,
            resolver,
            counters,
            state,
            requests,
            task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    /// Table this log writes to
    pub fn destination(&self) -> &TableRef {
        &self.destination
    }

    pub fn state(&self) -> FlushState {
        self.state.get()
    }

    pub fn stats(&self) -> SystemLogStats {
        self.counters.snapshot()
    }

    /// Records waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the destination table has been confirmed to exist
    pub fn is_table_created(&self) -> bool {
        self.resolver.is_created()
    }

    /// Queue a record for the next flush; never blocks on I/O
    ///
    /// Returns false when the record was dropped.
    pub fn add(&self, record: T) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        match self.buffer.push(record) {
            PushOutcome::Queued => {
                LogCounters::add(&self.counters.pushed, 1);
                true
            }
            PushOutcome::Dropped { first_in_episode } => {
                LogCounters::add(&self.counters.dropped_overflow, 1);
                if first_in_episode {
                    warn!(
                        kind = %self.kind,
                        max_buffer_size = self.buffer.max_size(),
                        "System log buffer is full, dropping new records until the next flush"
                    );
                }
                false
            }
        }
    }

    /// Flush now and wait for the result
    ///
    /// Everything added before the call is part of the flushed batch.
    pub async fn flush(&self) -> SystemLogResult<FlushReport> {
        let reply = self.request_flush().await?;
        reply.await.map_err(|_| SystemLogError::ShutDown)
    }

    /// Enqueue a flush request without waiting for it to complete
    pub(crate) async fn request_flush(&self) -> SystemLogResult<oneshot::Receiver<FlushReport>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SystemLogError::ShutDown);
        }
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(tx)
            .await
            .map_err(|_| SystemLogError::ShutDown)?;
        Ok(rx)
    }

    /// Stop accepting records; the flush task keeps running until shutdown
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait for the flush task to finish
    ///
    /// The task bounds its own shutdown by the shutdown timeout, so this
    /// returns within that bound once shutdown has been signalled.
    pub(crate) async fn join(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(kind = %self.kind, error = %e, "Flush task ended abnormally");
            }
        }
    }
}

impl<T: LogElement> std::fmt::Debug for SystemLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemLog")
            .field("kind", &self.kind)
            .field("destination", &self.destination)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}
