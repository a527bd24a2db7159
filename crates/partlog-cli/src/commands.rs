//! Command implementations, kept apart from argument parsing so they can be
//! driven from tests

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use partlog_core::{LogKind, PartLogElement, TableRef};
use partlog_engine::{
    MergeStats, OperationTimer, PartInfo, PartLogWriter, Resolution, SystemLogStats, SystemLogs,
    SystemLogsConfig,
};
use partlog_storage::Catalog;

/// Table workload run by `simulate`
#[derive(Debug, Clone)]
pub struct Workload {
    pub database: String,
    pub table: String,
    pub inserts: usize,
    pub merge: bool,
    pub mutate: bool,
    pub create_databases: bool,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            database: "default".to_string(),
            table: "test_table".to_string(),
            inserts: 1,
            merge: false,
            mutate: false,
            create_databases: false,
        }
    }
}

/// Per-log outcome of a simulation
#[derive(Debug, Serialize)]
pub struct LogSummary {
    pub kind: LogKind,
    /// Destination table, `None` when the log is disabled
    pub table: Option<String>,
    pub stats: SystemLogStats,
}

#[derive(Debug, Serialize)]
pub struct SimulationSummary {
    /// Part operations performed on the simulated table
    pub operations: usize,
    pub logs: Vec<LogSummary>,
}

/// Run `workload` with system logs configured by `config`
///
/// Returns after shutdown, so every record has either been written by the
/// final flush or counted as dropped.
pub async fn simulate(
    catalog: Arc<Catalog>,
    config: SystemLogsConfig,
    workload: &Workload,
) -> anyhow::Result<SimulationSummary> {
    if workload.create_databases {
        for kind in LogKind::ALL {
            if let Some(entry) = config.entry(kind) {
                if catalog.create_database(&entry.database)? {
                    info!(database = %entry.database, "Created destination database");
                }
            }
        }
    }

    let logs = SystemLogs::start(config, catalog)?;
    let writer = PartLogWriter::new(Arc::clone(&logs), &workload.database, &workload.table);
    let mut operations = 0;

    let mut parts: Vec<PartInfo> = (1..=workload.inserts)
        .map(|block| {
            let timer = OperationTimer::start();
            let part = simulated_part(workload, format!("all_{block}_{block}_0"), 1);
            writer.new_parts(std::slice::from_ref(&part), Some(&timer), None);
            operations += 1;
            part
        })
        .collect();

    if workload.merge && parts.len() > 1 {
        let timer = OperationTimer::start();
        let rows = parts.iter().map(|p| p.rows).sum();
        let merged = simulated_part(workload, format!("all_1_{}_1", parts.len()), rows);
        let sources: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
        let stats = MergeStats {
            read_rows: rows,
            read_bytes: parts.iter().map(|p| p.bytes_on_disk).sum(),
            bytes_uncompressed: rows * 64,
        };
        writer.merged(&merged, &sources, stats, Some(&timer), None);
        for source in &parts {
            writer.removed(source);
        }
        operations += 1 + parts.len();
        parts = vec![merged];
    }

    if workload.mutate {
        parts = parts
            .into_iter()
            .map(|source| {
                let timer = OperationTimer::start();
                let result = simulated_part(workload, format!("{}_2", source.name), source.rows);
                let stats = MergeStats {
                    read_rows: source.rows,
                    read_bytes: source.bytes_on_disk,
                    bytes_uncompressed: source.rows * 64,
                };
                writer.mutated(&result, &source.name, stats, Some(&timer), None);
                operations += 1;
                result
            })
            .collect();
    }

    logs.shutdown().await;
    info!(operations, parts = parts.len(), "Simulation finished");

    let logs_summary = LogKind::ALL
        .into_iter()
        .map(|kind| LogSummary {
            kind,
            table: match logs.resolve(kind) {
                Resolution::Table(table) => Some(table.to_string()),
                Resolution::Disabled => None,
            },
            stats: logs.stats(kind),
        })
        .collect();

    Ok(SimulationSummary {
        operations,
        logs: logs_summary,
    })
}

fn simulated_part(workload: &Workload, name: String, rows: u64) -> PartInfo {
    PartInfo::new(name.clone())
        .with_partition_id("all")
        .with_path_on_disk(format!(
            "/var/lib/partlog/data/{}/{}/{}/",
            workload.database, workload.table, name
        ))
        .with_rows(rows)
        .with_bytes_on_disk(rows * 32 + 256)
}

/// Run `future` to completion on a fresh runtime
///
/// Blocking work still running afterwards, such as an insert abandoned at
/// shutdown, gets at most `grace` before the runtime is torn down.
pub fn block_on_bounded<F: Future>(future: F, grace: Duration) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

/// Tables of `database`, sorted
pub fn list_tables(catalog: &Catalog, database: &str) -> anyhow::Result<Vec<String>> {
    let mut tables = catalog.list_tables(database)?;
    tables.sort();
    Ok(tables)
}

/// All rows of a part log table in insertion order
pub fn select_rows(
    catalog: &Catalog,
    database: &str,
    table: &str,
) -> anyhow::Result<Vec<PartLogElement>> {
    Ok(catalog.scan(&TableRef::new(database, table))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_bounded_does_not_wait_for_stuck_inserts() {
        let started = std::time::Instant::now();
        let output = block_on_bounded(
            async {
                // Never awaited, like an insert abandoned by the final flush
                drop(tokio::task::spawn_blocking(|| {
                    std::thread::sleep(Duration::from_secs(3))
                }));
                7
            },
            Duration::from_millis(100),
        )
        .unwrap();

        assert_eq!(output, 7);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
