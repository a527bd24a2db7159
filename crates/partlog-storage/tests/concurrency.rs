//! Concurrency tests for partlog-storage
//!
//! These tests hit the catalog from many threads at once to verify that
//! table creation stays idempotent and batch inserts never interleave.

use std::sync::{Arc, Barrier};
use std::thread;

use partlog_core::{LogElement, PartLogElement, TableRef};
use partlog_storage::{Catalog, CatalogConfig, CreateOutcome};
use tempfile::TempDir;

// ============================================================================
// Creation Races
// ============================================================================

/// Many threads racing to create the same table
///
/// Exactly one sees `Created`, every other one sees `AlreadyExists`, and no
/// caller gets an error.
#[test]
fn test_concurrent_create_same_table() {
    let temp_dir = TempDir::new().unwrap();
    let catalog =
        Arc::new(Catalog::open(CatalogConfig::with_path(temp_dir.path().join("race.redb"))).unwrap());
    let table = TableRef::new("system", "part_log");
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            let barrier = Arc::clone(&barrier);
            let table = table.clone();
            thread::spawn(move || {
                barrier.wait();
                catalog.create_table_if_not_exists(&table, &PartLogElement::schema())
            })
        })
        .collect();

    let outcomes: Vec<CreateOutcome> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("creation must not fail"))
        .collect();

    let created = outcomes
        .iter()
        .filter(|o| **o == CreateOutcome::Created)
        .count();
    assert_eq!(created, 1);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, CreateOutcome::Created | CreateOutcome::AlreadyExists)));
    assert_eq!(catalog.list_tables("system").unwrap(), vec!["part_log"]);
}

// ============================================================================
// Insert Atomicity
// ============================================================================

/// Concurrent batches land contiguously and nothing is lost
#[test]
fn test_concurrent_batches_are_atomic() {
    let catalog = Arc::new(Catalog::open_in_memory().unwrap());
    let table = TableRef::new("system", "part_log");
    catalog
        .create_table_if_not_exists(&table, &PartLogElement::schema())
        .unwrap();

    let writers = 8;
    let batch_size = 50;

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let catalog = Arc::clone(&catalog);
            let table = table.clone();
            thread::spawn(move || {
                let batch: Vec<PartLogElement> = (0..batch_size)
                    .map(|i| PartLogElement::new_part("default", format!("t{w}"), format!("all_{i}_{i}_0")))
                    .collect();
                catalog.insert_batch(&table, &batch).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), batch_size);
    }

    let rows: Vec<PartLogElement> = catalog.scan(&table).unwrap();
    assert_eq!(rows.len(), writers * batch_size);

    // Each batch occupies one contiguous run, in its own order
    for chunk in rows.chunks(batch_size) {
        let owner = &chunk[0].table;
        for (i, row) in chunk.iter().enumerate() {
            assert_eq!(&row.table, owner);
            assert_eq!(row.part_name, format!("all_{i}_{i}_0"));
        }
    }
}
