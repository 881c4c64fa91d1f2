//! # Retail Store
//!
//! Backend for a small computer shop, persisted in plain text files: products,
//! customers, employees and an append-only invoice ledger.
//!
//! ## Design Principles
//!
//! - **Files are the truth**: every operation re-reads the file it touches; nothing is cached
//! - **Fixed-point money**: 2 decimal places via `rust_decimal`
//! - **Stock moves only at commit**: an invoice re-validates and decrements stock in one step,
//!   and undoes the decrement if the ledger append fails
//! - **Tolerant reads**: malformed lines and ledger blocks are skipped with a warning
//!
//! ## Example
//!
//! ```no_run
//! use retail_store::{Money, Product, StoreConfig};
//! use std::str::FromStr;
//!
//! let engine = StoreConfig::new("data").open();
//! engine
//!     .products()
//!     .add(Product::accessory("A001", "Mouse", Money::from_str("19.90").unwrap(), 10, "Mouse"))
//!     .unwrap();
//!
//! let mut draft = engine.begin("KH001", "NV001").unwrap();
//! engine.add_item(&mut draft, "A001", 2).unwrap();
//! let invoice = engine.commit(&mut draft).unwrap();
//! println!("{}", invoice.encode_block());
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod invoice;
pub mod model;
pub mod money;
pub mod repository;
pub mod stats;
pub mod store;

pub use codec::Record;
pub use config::StoreConfig;
pub use engine::{plan_commit, CommitPlan, DraftLine, DraftState, InvoiceDraft, SalesEngine};
pub use error::{Result, StoreError};
pub use invoice::{replay_ledger, Invoice, InvoiceDetail, Ledger, PartyRef};
pub use model::{Customer, CustomerRank, Employee, Product, ProductKind};
pub use money::Money;
pub use repository::{
    CustomerRepository, EmployeeRepository, InventorySummary, ProductRepository, Repository,
};
pub use stats::{CustomerSales, DateRange, EmployeeSales, ProductSales, SalesReport};
pub use store::{EntityKind, FlatFileStore, MemoryStore, RecordStore, WriteMode};
