//! Stress tests for partlog-engine
//!
//! These tests verify producer behavior under high load: many concurrent
//! emitters, a saturated buffer, and flushes racing with producers.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use partlog_core::{LogKind, PartLogElement, TableRef};
use partlog_engine::{SystemLogConfig, SystemLogs, SystemLogsConfig};
use partlog_storage::Catalog;

fn part_log() -> TableRef {
    TableRef::new("system", "part_log")
}

// ============================================================================
// Throughput Tests
// ============================================================================

/// Test emitting 100,000 records from a single producer
///
/// Verifies emit stays cheap (it never touches storage) and that one flush
/// writes the whole batch.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_emit_throughput() {
    partlog_logging::init_testing();
    let catalog = Arc::new(Catalog::open_in_memory().unwrap());
    let logs = SystemLogs::start(
        SystemLogsConfig::default().with_default_log(LogKind::PartLog),
        catalog.clone(),
    )
    .unwrap();
    let record_count: usize = 100_000;

    let start = Instant::now();
    for i in 0..record_count {
        logs.emit(
            LogKind::PartLog,
            PartLogElement::new_part("default", "hits", format!("all_{i}_{i}_0")),
        );
    }
    let duration = start.elapsed();
    println!(
        "Emitted {} records in {:?} ({:.2} records/sec)",
        record_count,
        duration,
        record_count as f64 / duration.as_secs_f64()
    );

    let report = logs.flush(LogKind::PartLog).await.unwrap();
    assert_eq!(report.rows(), record_count);
    assert_eq!(catalog.count(&part_log()).unwrap(), record_count as u64);

    logs.shutdown().await;
}

// ============================================================================
// Concurrency Tests
// ============================================================================

/// Test many OS threads emitting while the flush task runs on a short interval
///
/// Every accepted record must land exactly once, and each producer's records
/// must keep their relative order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_with_periodic_flush() {
    const NUM_THREADS: usize = 16;
    const PER_THREAD: usize = 2_000;

    partlog_logging::init_testing();
    let catalog = Arc::new(Catalog::open_in_memory().unwrap());
    let config = SystemLogsConfig::default().with_log(
        LogKind::PartLog,
        SystemLogConfig::default().with_flush_interval(Duration::from_millis(10)),
    );
    let logs = SystemLogs::start(config, catalog.clone()).unwrap();

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|t| {
            let logs = Arc::clone(&logs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    logs.emit(
                        LogKind::PartLog,
                        PartLogElement::new_part("default", format!("t{t}"), format!("{i}")),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    logs.shutdown().await;

    let rows: Vec<PartLogElement> = catalog.scan(&part_log()).unwrap();
    assert_eq!(rows.len(), NUM_THREADS * PER_THREAD);

    for t in 0..NUM_THREADS {
        let table = format!("t{t}");
        let seq: Vec<usize> = rows
            .iter()
            .filter(|r| r.table == table)
            .map(|r| r.part_name.parse().unwrap())
            .collect();
        assert_eq!(seq, (0..PER_THREAD).collect::<Vec<_>>());
    }

    let stats = logs.stats(LogKind::PartLog);
    assert_eq!(stats.pushed, (NUM_THREADS * PER_THREAD) as u64);
    assert_eq!(stats.flushed_rows, stats.pushed);
    println!("{} flushes for {} rows", stats.flushes, stats.flushed_rows);
}

// ============================================================================
// Capacity Tests
// ============================================================================

/// Test a saturated buffer with concurrent producers
///
/// The buffer bound is never exceeded and every record is accounted for as
/// either pushed or dropped.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_saturated_buffer_accounting() {
    const NUM_THREADS: usize = 8;
    const PER_THREAD: usize = 5_000;
    const BOUND: usize = 1_000;

    partlog_logging::init_testing();
    let catalog = Arc::new(Catalog::open_in_memory().unwrap());
    let logs = SystemLogs::start(
        SystemLogsConfig::default()
            .with_default_log(LogKind::PartLog)
            .with_max_buffer_size(BOUND),
        catalog.clone(),
    )
    .unwrap();

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|t| {
            let logs = Arc::clone(&logs);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    logs.emit(
                        LogKind::PartLog,
                        PartLogElement::new_part("default", "hits", format!("{t}_{i}")),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let log = logs.log(LogKind::PartLog).unwrap();
    assert_eq!(log.pending(), BOUND);

    let stats = logs.stats(LogKind::PartLog);
    assert_eq!(stats.pushed, BOUND as u64);
    assert_eq!(
        stats.pushed + stats.dropped_overflow,
        (NUM_THREADS * PER_THREAD) as u64
    );

    logs.shutdown().await;
    assert_eq!(catalog.count(&part_log()).unwrap(), BOUND as u64);
}

/// Test admin flushes racing with producers
///
/// Concurrent flush requests never lose or duplicate a record.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_flush_requests_racing_producers() {
    partlog_logging::init_testing();
    let catalog = Arc::new(Catalog::open_in_memory().unwrap());
    let logs = SystemLogs::start(
        SystemLogsConfig::default().with_default_log(LogKind::PartLog),
        catalog.clone(),
    )
    .unwrap();

    let producer = {
        let logs = Arc::clone(&logs);
        thread::spawn(move || {
            for i in 0..10_000 {
                logs.emit(
                    LogKind::PartLog,
                    PartLogElement::new_part("default", "hits", format!("{i}")),
                );
            }
        })
    };

    let mut flushed = 0usize;
    let flushers: Vec<_> = (0..8)
        .map(|_| {
            let logs = Arc::clone(&logs);
            tokio::spawn(async move {
                let mut rows = 0;
                for _ in 0..10 {
                    rows += logs.flush(LogKind::PartLog).await.unwrap().rows();
                }
                rows
            })
        })
        .collect();
    for flusher in flushers {
        flushed += flusher.await.unwrap();
    }
    producer.join().unwrap();

    flushed += logs.flush(LogKind::PartLog).await.unwrap().rows();
    assert_eq!(flushed, 10_000);
    assert_eq!(catalog.count(&part_log()).unwrap(), 10_000);

    logs.shutdown().await;
}
