//! Integration test for the process-wide handle
//!
//! The handle can only be installed once per process, so the whole lifecycle
//! runs in a single test.

use std::sync::Arc;

use partlog_core::{LogKind, PartLogElement, TableRef};
use partlog_engine::{
    PartInfo, PartLogWriter, SystemLogError, SystemLogs, SystemLogsConfig, global,
};
use partlog_storage::Catalog;

#[tokio::test]
async fn test_global_lifecycle() {
    partlog_logging::init_testing();
    let catalog = Arc::new(Catalog::open_in_memory().unwrap());
    let part_log = TableRef::new("system", "part_log");
    let writer = PartLogWriter::global("default", "hits");

    // Before install everything is a silent no-op
    assert!(global::get().is_none());
    assert!(!global::is_enabled(LogKind::PartLog));
    global::emit(LogKind::PartLog, PartLogElement::new_part("default", "hits", "early"));
    assert!(!writer.new_parts(&[PartInfo::new("early")], None, None));
    assert!(matches!(
        global::flush(LogKind::PartLog).await,
        Err(SystemLogError::NotInitialized)
    ));

    let logs = SystemLogs::start(
        SystemLogsConfig::default().with_default_log(LogKind::PartLog),
        catalog.clone(),
    )
    .unwrap();
    global::install(Arc::clone(&logs)).unwrap();

    // Second install is rejected
    let other = SystemLogs::start(SystemLogsConfig::default(), catalog.clone()).unwrap();
    assert!(matches!(
        global::install(other),
        Err(SystemLogError::AlreadyInitialized)
    ));

    assert!(global::is_enabled(LogKind::PartLog));
    assert!(!global::is_enabled(LogKind::MutationLog));

    global::emit(LogKind::PartLog, PartLogElement::new_part("default", "hits", "all_1_1_0"));
    assert!(writer.new_parts(&[PartInfo::new("all_2_2_0")], None, None));
    let report = global::flush(LogKind::PartLog).await.unwrap();
    assert_eq!(report.rows(), 2);

    let names: Vec<String> = catalog
        .scan::<PartLogElement>(&part_log)
        .unwrap()
        .into_iter()
        .map(|r| r.part_name)
        .collect();
    assert_eq!(names, vec!["all_1_1_0", "all_2_2_0"]);

    global::emit(LogKind::PartLog, PartLogElement::new_part("default", "hits", "all_3_3_0"));
    global::shutdown().await;
    assert!(global::get().is_some_and(|logs| logs.is_shut_down()));
    assert_eq!(catalog.count(&part_log).unwrap(), 3);

    // After shutdown emits are dropped and the writer reports disabled
    global::emit(LogKind::PartLog, PartLogElement::new_part("default", "hits", "late"));
    assert!(!writer.is_enabled());
    assert_eq!(catalog.count(&part_log).unwrap(), 3);
}
