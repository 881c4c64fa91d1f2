//! Retail Store CLI
//!
//! Read-side reports over the store's data directory.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --data-dir data report --from 2026-10-01 > sales.csv
//! cargo run -- inventory --threshold 3
//! cargo run -- invoice HD261016101500
//! cargo run -- history KH001
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use clap::Parser;
use retail_store::cli::{CliArgs, Command};
use retail_store::store::DELIMITER;
use retail_store::{EntityKind, Result, SalesReport, StoreError};
use std::io::{self, Write};
use std::process;

fn main() {
    env_logger::init();

    let args = CliArgs::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &CliArgs) -> Result<()> {
    let config = args.to_store_config();
    let engine = config.open();

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match &args.command {
        Command::Report { .. } => {
            let report = SalesReport::generate(&engine, Some(args.date_range()?), config.top_n)?;
            report.write_csv(handle)?;
        }
        Command::Inventory { .. } => {
            let summary = engine.products().inventory_summary(config.low_stock_threshold)?;
            summary.write_csv(handle)?;
        }
        Command::Invoice { id } => {
            let invoice = engine
                .find_invoice(id)?
                .ok_or_else(|| StoreError::not_found(EntityKind::Invoice, id))?;
            writeln!(handle, "{}", invoice.encode_block())?;
        }
        Command::History { customer_id } => {
            for invoice in engine.customer_history(customer_id)? {
                writeln!(handle, "{}", invoice.encode_block())?;
                writeln!(handle, "{}", DELIMITER)?;
            }
        }
    }

    Ok(())
}
