//! PartLog command-line driver
//!
//! `partlog simulate` runs a small table workload (inserts, an optional merge
//! and mutation) with system logs enabled by a JSON configuration, then shuts
//! the logs down so the final flush lands in the catalog. `partlog tables`
//! and `partlog select` read the result back.

pub mod commands;
pub mod config;

pub use commands::{
    LogSummary, SimulationSummary, Workload, block_on_bounded, list_tables, select_rows, simulate,
};
pub use config::{CATALOG_FILE, Cli, Command, catalog_config, load_logs_config};
