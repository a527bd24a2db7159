//! Process-wide system logs handle
//!
//! Storage engine code deep in a call stack emits through these functions
//! instead of threading an `Arc<SystemLogs>` everywhere. The registry is
//! installed once at server start; before that, and after shutdown, every
//! emit is a no-op.

use std::sync::{Arc, OnceLock};

use partlog_core::{LogKind, PartLogElement};

use crate::error::{SystemLogError, SystemLogResult};
use crate::registry::SystemLogs;
use crate::scheduler::FlushReport;

static SYSTEM_LOGS: OnceLock<Arc<SystemLogs>> = OnceLock::new();

/// Install the process-wide registry
///
/// Fails with [`SystemLogError::AlreadyInitialized`] on a second call, even
/// if the first registry has since been shut down.
pub fn install(logs: Arc<SystemLogs>) -> SystemLogResult<()> {
    SYSTEM_LOGS
        .set(logs)
        .map_err(|_| SystemLogError::AlreadyInitialized)
}

/// The installed registry, if any
pub fn get() -> Option<Arc<SystemLogs>> {
    SYSTEM_LOGS.get().cloned()
}

/// Record a structural event through the installed registry
pub fn emit(kind: LogKind, record: PartLogElement) {
    if let Some(logs) = SYSTEM_LOGS.get() {
        logs.emit(kind, record);
    }
}

/// Whether the installed registry has `kind` enabled
pub fn is_enabled(kind: LogKind) -> bool {
    SYSTEM_LOGS
        .get()
        .is_some_and(|logs| !logs.is_shut_down() && logs.is_enabled(kind))
}

/// Flush `kind` through the installed registry
pub async fn flush(kind: LogKind) -> SystemLogResult<FlushReport> {
    let logs = get().ok_or(SystemLogError::NotInitialized)?;
    logs.flush(kind).await
}

/// Shut down the installed registry, if any
pub async fn shutdown() {
    if let Some(logs) = get() {
        logs.shutdown().await;
    }
}
