use std::sync::Arc;

use clap::Parser;
use partlog_cli::{
    Cli, Command, Workload, block_on_bounded, catalog_config, list_tables, load_logs_config,
    select_rows, simulate,
};
use partlog_logging::{LogConfig, PartlogSubscriberBuilder};
use partlog_storage::Catalog;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output
    let _guard = PartlogSubscriberBuilder::new()
        .with_config(LogConfig::cli(cli.log_level.as_str()))
        .init();

    match cli.command {
        Command::Simulate {
            data_dir,
            config,
            inserts,
            merge,
            mutate,
            database,
            table,
            create_databases,
        } => {
            std::fs::create_dir_all(&data_dir)?;
            let logs_config = load_logs_config(config.as_deref())?;
            let catalog = Arc::new(Catalog::open(catalog_config(&data_dir))?);
            let workload = Workload {
                database,
                table,
                inserts,
                merge,
                mutate,
                create_databases,
            };

            // Inserts abandoned at shutdown get one more timeout, then the process exits
            let grace = logs_config.shutdown_timeout();
            let summary = block_on_bounded(simulate(catalog, logs_config, &workload), grace)??;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Tables { data_dir, database } => {
            let catalog = Catalog::open(catalog_config(&data_dir))?;
            for table in list_tables(&catalog, &database)? {
                println!("{}", table);
            }
        }

        Command::Select {
            data_dir,
            database,
            table,
        } => {
            let catalog = Catalog::open(catalog_config(&data_dir))?;
            for row in select_rows(&catalog, &database, &table)? {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
    }

    Ok(())
}
