//! Producer-side helpers for part operations
//!
//! A table's write, merge and fetch paths hold a [`PartLogWriter`] and call
//! one method per finished operation. Each method builds one record per part
//! and hands it to the registry; none of them block or fail. When the target
//! log is disabled the records are not even built.

use std::sync::Arc;
use std::time::Instant;

use partlog_core::{LogKind, PartEventType, PartLogElement, PartLogError};

use crate::global;
use crate::registry::SystemLogs;

/// Description of one data part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartInfo {
    pub name: String,
    pub partition_id: String,
    pub path_on_disk: String,
    pub rows: u64,
    pub bytes_on_disk: u64,
}

impl PartInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_partition_id(mut self, partition_id: impl Into<String>) -> Self {
        self.partition_id = partition_id.into();
        self
    }

    pub fn with_path_on_disk(mut self, path: impl Into<String>) -> Self {
        self.path_on_disk = path.into();
        self
    }

    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_bytes_on_disk(mut self, bytes: u64) -> Self {
        self.bytes_on_disk = bytes;
        self
    }
}

/// Wall-clock duration of an operation, started when the operation begins
#[derive(Debug, Clone, Copy)]
pub struct OperationTimer {
    started: Instant,
}

impl OperationTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        crate::config::duration_ms(self.started.elapsed())
    }
}

/// Read statistics of a merge or mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub read_rows: u64,
    pub read_bytes: u64,
    pub bytes_uncompressed: u64,
}

#[derive(Debug, Clone)]
enum Sink {
    Registry(Arc<SystemLogs>),
    Global,
}

impl Sink {
    fn is_enabled(&self, kind: LogKind) -> bool {
        match self {
            Self::Registry(logs) => !logs.is_shut_down() && logs.is_enabled(kind),
            Self::Global => global::is_enabled(kind),
        }
    }

    fn emit(&self, kind: LogKind, record: PartLogElement) {
        match self {
            Self::Registry(logs) => logs.emit(kind, record),
            Self::Global => global::emit(kind, record),
        }
    }
}

/// Emits part lifecycle records on behalf of one table
#[derive(Debug, Clone)]
pub struct PartLogWriter {
    sink: Sink,
    database: String,
    table: String,
}

impl PartLogWriter {
    /// Writer emitting through `logs`
    pub fn new(logs: Arc<SystemLogs>, database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            sink: Sink::Registry(logs),
            database: database.into(),
            table: table.into(),
        }
    }

    /// Writer emitting through the process-wide registry
    pub fn global(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            sink: Sink::Global,
            database: database.into(),
            table: table.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether part events of this table are being recorded
    pub fn is_enabled(&self) -> bool {
        self.sink.is_enabled(LogKind::PartLog)
    }

    /// Parts written by one insert; `error` marks every record
    ///
    /// Returns false when nothing was recorded.
    pub fn new_parts(
        &self,
        parts: &[PartInfo],
        timer: Option<&OperationTimer>,
        error: Option<&PartLogError>,
    ) -> bool {
        if parts.is_empty() || !self.sink.is_enabled(LogKind::PartLog) {
            return false;
        }
        for part in parts {
            let record = self.record(PartEventType::NewPart, part, timer, error);
            self.sink.emit(LogKind::PartLog, record);
        }
        true
    }

    /// A part produced by merging `sources`, in merge order
    pub fn merged(
        &self,
        result: &PartInfo,
        sources: &[&str],
        stats: MergeStats,
        timer: Option<&OperationTimer>,
        error: Option<&PartLogError>,
    ) -> bool {
        if !self.sink.is_enabled(LogKind::PartLog) {
            return false;
        }
        let record = self
            .record(PartEventType::MergeParts, result, timer, error)
            .with_merged_from(sources.iter().copied())
            .with_read_stats(stats.read_rows, stats.read_bytes, stats.bytes_uncompressed);
        self.sink.emit(LogKind::PartLog, record);
        true
    }

    /// A part rewritten by a mutation of `source`
    ///
    /// Goes to the mutation log when that is enabled, to the part log
    /// otherwise.
    pub fn mutated(
        &self,
        result: &PartInfo,
        source: &str,
        stats: MergeStats,
        timer: Option<&OperationTimer>,
        error: Option<&PartLogError>,
    ) -> bool {
        let kind = if self.sink.is_enabled(LogKind::MutationLog) {
            LogKind::MutationLog
        } else if self.sink.is_enabled(LogKind::PartLog) {
            LogKind::PartLog
        } else {
            return false;
        };
        let record = self
            .record(PartEventType::MutatePart, result, timer, error)
            .with_merged_from([source])
            .with_read_stats(stats.read_rows, stats.read_bytes, stats.bytes_uncompressed);
        self.sink.emit(kind, record);
        true
    }

    /// A part fetched from a replica
    pub fn downloaded(
        &self,
        part: &PartInfo,
        timer: Option<&OperationTimer>,
        error: Option<&PartLogError>,
    ) -> bool {
        self.single(PartEventType::DownloadPart, part, timer, error)
    }

    /// A part removed from the working set
    pub fn removed(&self, part: &PartInfo) -> bool {
        self.single(PartEventType::RemovePart, part, None, None)
    }

    /// A part moved to another disk or volume
    pub fn moved(
        &self,
        part: &PartInfo,
        timer: Option<&OperationTimer>,
        error: Option<&PartLogError>,
    ) -> bool {
        self.single(PartEventType::MovePart, part, timer, error)
    }

    fn single(
        &self,
        event_type: PartEventType,
        part: &PartInfo,
        timer: Option<&OperationTimer>,
        error: Option<&PartLogError>,
    ) -> bool {
        if !self.sink.is_enabled(LogKind::PartLog) {
            return false;
        }
        let record = self.record(event_type, part, timer, error);
        self.sink.emit(LogKind::PartLog, record);
        true
    }

    fn record(
        &self,
        event_type: PartEventType,
        part: &PartInfo,
        timer: Option<&OperationTimer>,
        error: Option<&PartLogError>,
    ) -> PartLogElement {
        let mut record = PartLogElement::new(event_type, &self.database, &self.table, &part.name)
            .with_partition_id(&part.partition_id)
            .with_path_on_disk(&part.path_on_disk)
            .with_rows(part.rows)
            .with_bytes_on_disk(part.bytes_on_disk)
            .with_duration_ms(timer.map_or(0, OperationTimer::elapsed_ms));
        if let Some(error) = error {
            record = record.with_error(error.clone());
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SystemLogConfig, SystemLogsConfig};
    use partlog_core::TableRef;
    use partlog_storage::Catalog;

    async fn start(config: SystemLogsConfig) -> (Arc<Catalog>, Arc<SystemLogs>) {
        let catalog = Arc::new(Catalog::open_in_memory().unwrap());
        let logs = SystemLogs::start(config, catalog.clone()).unwrap();
        (catalog, logs)
    }

    fn part(name: &str) -> PartInfo {
        PartInfo::new(name)
            .with_partition_id("all")
            .with_path_on_disk(format!("/data/db/t/{name}/"))
            .with_rows(10)
            .with_bytes_on_disk(1024)
    }

    #[tokio::test]
    async fn test_new_parts_one_record_per_part() {
        let (catalog, logs) =
            start(SystemLogsConfig::default().with_default_log(LogKind::PartLog)).await;
        let writer = PartLogWriter::new(logs.clone(), "db", "t");
        let error = PartLogError::new(241, "Memory limit exceeded");

        assert!(writer.new_parts(&[part("all_1_1_0"), part("all_2_2_0")], None, Some(&error)));
        logs.flush(LogKind::PartLog).await.unwrap();

        let rows: Vec<PartLogElement> = catalog.scan(&TableRef::new("system", "part_log")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].part_name, "all_1_1_0");
        assert_eq!(rows[1].part_name, "all_2_2_0");
        assert!(rows.iter().all(|r| r.error.as_ref() == Some(&error)));
        assert!(rows.iter().all(|r| r.table == "t" && r.rows == 10));

        logs.shutdown().await;
    }

    #[tokio::test]
    async fn test_merged_records_sources_in_order() {
        let (catalog, logs) =
            start(SystemLogsConfig::default().with_default_log(LogKind::PartLog)).await;
        let writer = PartLogWriter::new(logs.clone(), "db", "t");
        let timer = OperationTimer::start();
        let stats = MergeStats {
            read_rows: 20,
            read_bytes: 2048,
            bytes_uncompressed: 4096,
        };

        writer.merged(
            &part("all_1_2_1"),
            &["all_1_1_0", "all_2_2_0"],
            stats,
            Some(&timer),
            None,
        );
        logs.flush(LogKind::PartLog).await.unwrap();

        let rows: Vec<PartLogElement> = catalog.scan(&TableRef::new("system", "part_log")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, PartEventType::MergeParts);
        assert_eq!(rows[0].merged_from, vec!["all_1_1_0", "all_2_2_0"]);
        assert_eq!(rows[0].read_rows, 20);
        assert!(rows[0].is_success());

        logs.shutdown().await;
    }

    #[tokio::test]
    async fn test_mutation_routing() {
        let (catalog, logs) = start(
            SystemLogsConfig::default()
                .with_default_log(LogKind::PartLog)
                .with_log(LogKind::MutationLog, SystemLogConfig::default()),
        )
        .await;
        let writer = PartLogWriter::new(logs.clone(), "db", "t");

        writer.mutated(&part("all_1_1_0_2"), "all_1_1_0", MergeStats::default(), None, None);
        logs.flush_all().await.unwrap();

        let mutations: Vec<PartLogElement> =
            catalog.scan(&TableRef::new("system", "mutation_log")).unwrap();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].merged_from, vec!["all_1_1_0"]);
        assert!(!catalog.table_exists(&TableRef::new("system", "part_log")).unwrap());

        logs.shutdown().await;
    }

    #[tokio::test]
    async fn test_mutation_falls_back_to_part_log() {
        let (catalog, logs) =
            start(SystemLogsConfig::default().with_default_log(LogKind::PartLog)).await;
        let writer = PartLogWriter::new(logs.clone(), "db", "t");

        assert!(writer.mutated(&part("all_1_1_0_2"), "all_1_1_0", MergeStats::default(), None, None));
        logs.flush(LogKind::PartLog).await.unwrap();

        let rows: Vec<PartLogElement> = catalog.scan(&TableRef::new("system", "part_log")).unwrap();
        assert_eq!(rows[0].event_type, PartEventType::MutatePart);

        logs.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_writer_builds_nothing() {
        let (_catalog, logs) = start(SystemLogsConfig::default()).await;
        let writer = PartLogWriter::new(logs.clone(), "db", "t");

        assert!(!writer.is_enabled());
        assert!(!writer.new_parts(&[part("all_1_1_0")], None, None));
        assert!(!writer.removed(&part("all_1_1_0")));
        assert!(!writer.mutated(&part("all_1_1_0_2"), "all_1_1_0", MergeStats::default(), None, None));
        // Nothing reached the registry either
        assert_eq!(logs.stats(LogKind::PartLog).dropped_disabled, 0);

        logs.shutdown().await;
    }

    #[tokio::test]
    async fn test_other_events() {
        let (catalog, logs) =
            start(SystemLogsConfig::default().with_default_log(LogKind::PartLog)).await;
        let writer = PartLogWriter::new(logs.clone(), "db", "t");

        writer.downloaded(&part("all_3_3_0"), None, None);
        writer.moved(&part("all_3_3_0"), None, None);
        writer.removed(&part("all_3_3_0"));
        logs.flush(LogKind::PartLog).await.unwrap();

        let types: Vec<PartEventType> = catalog
            .scan::<PartLogElement>(&TableRef::new("system", "part_log"))
            .unwrap()
            .into_iter()
            .map(|r| r.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                PartEventType::DownloadPart,
                PartEventType::MovePart,
                PartEventType::RemovePart
            ]
        );

        logs.shutdown().await;
    }

    #[test]
    fn test_timer_measures_elapsed() {
        let timer = OperationTimer::start();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 5);
    }
}
