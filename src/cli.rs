use crate::config::{StoreConfig, DEFAULT_DATA_DIR};
use crate::error::Result;
use crate::stats::DateRange;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Query the retail store's flat files
#[derive(Parser, Debug)]
#[command(name = "retail-store")]
#[command(about = "Reports over a flat-file retail store", long_about = None)]
pub struct CliArgs {
    /// Directory holding products.txt, customers.txt, employees.txt and invoices.txt
    #[arg(
        long = "data-dir",
        value_name = "DIR",
        default_value = DEFAULT_DATA_DIR,
        global = true,
        help = "Directory containing the store's data files"
    )]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sales report as CSV: totals, top products, customers and employees
    Report {
        #[arg(long = "from", value_name = "YYYY-MM-DD", help = "First day included in the report")]
        from: Option<NaiveDate>,

        #[arg(long = "to", value_name = "YYYY-MM-DD", help = "Last day included in the report")]
        to: Option<NaiveDate>,

        #[arg(long = "top", value_name = "N", help = "Rows per ranking (default: 5, 0 for all)")]
        top: Option<usize>,
    },

    /// Inventory summary and low-stock products as CSV
    Inventory {
        #[arg(
            long = "threshold",
            value_name = "QTY",
            help = "Quantity at or below which a product is low on stock (default: 5)"
        )]
        threshold: Option<u32>,
    },

    /// Print one invoice from the ledger
    Invoice {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Print every invoice of one customer
    History {
        #[arg(value_name = "CUSTOMER_ID")]
        customer_id: String,
    },
}

impl CliArgs {
    /// Store settings from the arguments, falling back to defaults.
    pub fn to_store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(&self.data_dir);
        match &self.command {
            Command::Report { top: Some(top), .. } => config.top_n = *top,
            Command::Inventory {
                threshold: Some(threshold),
            } => config.low_stock_threshold = *threshold,
            _ => {}
        }
        config
    }

    /// Date range of a `report` command; unbounded for other commands.
    pub fn date_range(&self) -> Result<DateRange> {
        match &self.command {
            Command::Report { from, to, .. } => DateRange::new(*from, *to),
            _ => Ok(DateRange::default()),
        }
    }
}
