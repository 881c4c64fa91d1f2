//! Invoice model and the ledger block format.
//!
//! The ledger is append-only. Each committed invoice is written as one block:
//!
//! ```text
//! Invoice [ID: HD261016101500, Date: 2026-10-16 10:15:00]
//! Customer: KH001 - Alice
//! Employee: NV001 - Bob
//! Items:
//! - Dell XPS (Id: C001) x3: 3,899.97
//! Total: 3,899.97
//! ```
//!
//! Invoices are never cached; they are rebuilt by replaying the ledger lines.

use crate::codec::{encode_fields, FieldLine};
use crate::error::{Result, StoreError};
use crate::model::parse_quantity;
use crate::money::Money;
use crate::store::{EntityKind, RecordStore, WriteMode};
use chrono::NaiveDateTime;
use log::{debug, warn};
use std::str::FromStr;

/// Timestamp layout used in invoice headers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static HEADER_KEYS: [&str; 2] = ["ID", "Date"];

const CUSTOMER_PREFIX: &str = "Customer:";
const EMPLOYEE_PREFIX: &str = "Employee:";
const ITEMS_LINE: &str = "Items:";
const TOTAL_PREFIX: &str = "Total:";

/// One sold line. The unit price is frozen at sale time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDetail {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl InvoiceDetail {
    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    fn encode(&self) -> String {
        format!(
            "- {} (Id: {}) x{}: {}",
            self.product_name,
            self.product_id,
            self.quantity,
            self.subtotal().grouped()
        )
    }

    fn decode(line: &str) -> Result<Self> {
        let body = line
            .trim()
            .strip_prefix("- ")
            .ok_or_else(|| StoreError::decode(line, "item line must start with '- '"))?;
        let id_at = body
            .rfind(" (Id: ")
            .ok_or_else(|| StoreError::decode(line, "missing product id"))?;
        let product_name = body[..id_at].trim().to_string();
        let rest = &body[id_at + " (Id: ".len()..];
        let (product_id, rest) = rest
            .split_once(") x")
            .ok_or_else(|| StoreError::decode(line, "missing quantity"))?;
        let (qty, amount) = rest
            .split_once(':')
            .ok_or_else(|| StoreError::decode(line, "missing amount"))?;

        let quantity = parse_quantity(qty)
            .filter(|q| *q > 0)
            .ok_or_else(|| StoreError::decode(line, format!("bad quantity '{}'", qty.trim())))?;
        let subtotal = Money::from_str(amount)
            .map_err(|e| StoreError::decode(line, format!("bad amount '{}': {}", amount.trim(), e)))?;
        let unit_price = subtotal
            .per_unit(quantity)
            .ok_or_else(|| StoreError::decode(line, "zero quantity"))?;

        Ok(InvoiceDetail {
            product_id: product_id.trim().to_string(),
            product_name,
            quantity,
            unit_price,
        })
    }
}

/// Reference to the customer or employee on an invoice, as recorded at sale time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyRef {
    pub id: String,
    pub name: String,
}

impl PartyRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        PartyRef {
            id: id.into(),
            name: name.into(),
        }
    }

    fn decode(line: &str, prefix: &str) -> Result<Self> {
        let rest = line
            .trim()
            .strip_prefix(prefix)
            .ok_or_else(|| StoreError::decode(line, format!("expected '{}'", prefix)))?;
        let (id, name) = rest
            .split_once(" - ")
            .ok_or_else(|| StoreError::decode(line, "expected '<id> - <name>'"))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(StoreError::decode(line, "blank reference id"));
        }
        Ok(PartyRef::new(id, name.trim()))
    }
}

/// A committed sale. Immutable once written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub customer: PartyRef,
    pub employee: PartyRef,
    pub items: Vec<InvoiceDetail>,
}

impl Invoice {
    /// Id derived from the commit time: `HD` + `yyMMddHHmmss`.
    pub fn id_for(timestamp: NaiveDateTime) -> String {
        format!("HD{}", timestamp.format("%y%m%d%H%M%S"))
    }

    /// Sum of the line subtotals.
    pub fn total(&self) -> Money {
        self.items.iter().map(InvoiceDetail::subtotal).sum()
    }

    /// Number of units sold across all lines.
    pub fn units(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Renders the ledger block (without delimiters).
    pub fn encode_block(&self) -> String {
        let mut lines = Vec::with_capacity(self.items.len() + 5);
        lines.push(encode_fields(
            "Invoice",
            &[
                ("ID", self.id.clone()),
                ("Date", self.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            ],
        ));
        lines.push(format!("{} {} - {}", CUSTOMER_PREFIX, self.customer.id, self.customer.name));
        lines.push(format!("{} {} - {}", EMPLOYEE_PREFIX, self.employee.id, self.employee.name));
        lines.push(ITEMS_LINE.to_string());
        lines.extend(self.items.iter().map(InvoiceDetail::encode));
        lines.push(format!("{} {}", TOTAL_PREFIX, self.total().grouped()));
        lines.join("\n")
    }
}

/// An invoice block whose header has been read but whose total line has not.
struct PendingInvoice {
    id: String,
    timestamp: NaiveDateTime,
    customer: Option<PartyRef>,
    employee: Option<PartyRef>,
    items: Vec<InvoiceDetail>,
}

impl PendingInvoice {
    fn start(line: &str) -> Result<Self> {
        let header = FieldLine::parse(line, |tag| (tag == "Invoice").then_some(&HEADER_KEYS[..]))?;
        let id = header.required("ID")?;
        if id.is_empty() {
            return Err(StoreError::decode(line, "blank invoice id"));
        }
        let date = header.required("Date")?;
        let timestamp = NaiveDateTime::parse_from_str(date, TIMESTAMP_FORMAT)
            .map_err(|e| StoreError::decode(line, format!("bad date '{}': {}", date, e)))?;

        Ok(PendingInvoice {
            id: id.to_string(),
            timestamp,
            customer: None,
            employee: None,
            items: Vec::new(),
        })
    }

    /// Consumes one body line of the block.
    fn accept(&mut self, line: &str) -> Result<()> {
        let trimmed = line.trim();
        if trimmed.starts_with(CUSTOMER_PREFIX) {
            self.customer = Some(PartyRef::decode(trimmed, CUSTOMER_PREFIX)?);
        } else if trimmed.starts_with(EMPLOYEE_PREFIX) {
            self.employee = Some(PartyRef::decode(trimmed, EMPLOYEE_PREFIX)?);
        } else if trimmed == ITEMS_LINE {
            // section marker only
        } else if trimmed.starts_with("- ") {
            self.items.push(InvoiceDetail::decode(trimmed)?);
        } else {
            return Err(StoreError::decode(line, "unexpected line inside invoice block"));
        }
        Ok(())
    }

    /// Closes the block on its total line, checking it against the items.
    fn finish(self, line: &str) -> Result<Invoice> {
        let raw = line.trim().trim_start_matches(TOTAL_PREFIX);
        let recorded = Money::from_str(raw)
            .map_err(|e| StoreError::decode(line, format!("bad total '{}': {}", raw.trim(), e)))?;

        let customer = self
            .customer
            .ok_or_else(|| StoreError::decode(line, format!("invoice {} has no customer", self.id)))?;
        let employee = self
            .employee
            .ok_or_else(|| StoreError::decode(line, format!("invoice {} has no employee", self.id)))?;
        if self.items.is_empty() {
            return Err(StoreError::decode(line, format!("invoice {} has no items", self.id)));
        }

        let invoice = Invoice {
            id: self.id,
            timestamp: self.timestamp,
            customer,
            employee,
            items: self.items,
        };
        if invoice.total() != recorded {
            return Err(StoreError::decode(
                line,
                format!(
                    "invoice {} total {} does not match items {}",
                    invoice.id,
                    recorded,
                    invoice.total()
                ),
            ));
        }
        Ok(invoice)
    }
}

/// Rebuilds every well-formed invoice from ledger lines, in ledger order.
///
/// A malformed block is logged and skipped; replay resumes at the next header.
pub fn replay_ledger<L: AsRef<str>>(lines: &[L]) -> Vec<Invoice> {
    let mut invoices = Vec::new();
    let mut pending: Option<PendingInvoice> = None;

    for line in lines.iter().map(AsRef::as_ref) {
        let trimmed = line.trim();
        if trimmed.starts_with("Invoice [") {
            if let Some(open) = pending.take() {
                warn!("Ledger: invoice {} has no total line, skipping", open.id);
            }
            match PendingInvoice::start(trimmed) {
                Ok(started) => pending = Some(started),
                Err(e) => warn!("Ledger: {}", e),
            }
            continue;
        }

        let Some(mut open) = pending.take() else {
            continue;
        };

        if trimmed.starts_with(TOTAL_PREFIX) {
            match open.finish(trimmed) {
                Ok(invoice) => invoices.push(invoice),
                Err(e) => warn!("Ledger: {}", e),
            }
        } else if let Err(e) = open.accept(trimmed) {
            warn!("Ledger: invoice {} skipped: {}", open.id, e);
        } else {
            pending = Some(open);
        }
    }

    if let Some(open) = pending {
        warn!("Ledger: invoice {} has no total line, skipping", open.id);
    }
    invoices
}

/// Read and append access to the invoice ledger.
#[derive(Debug, Clone)]
pub struct Ledger<S> {
    store: S,
}

impl<S: RecordStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Ledger { store }
    }

    /// Raw data lines of the ledger, structural noise removed.
    pub fn lines(&self) -> Result<Vec<String>> {
        self.store.read_lines(EntityKind::Invoice)
    }

    /// Every well-formed invoice, in the order it was committed.
    pub fn invoices(&self) -> Result<Vec<Invoice>> {
        let invoices = replay_ledger(&self.lines()?);
        debug!("Replayed {} invoice(s) from ledger", invoices.len());
        Ok(invoices)
    }

    pub fn find(&self, id: &str) -> Result<Option<Invoice>> {
        Ok(self.invoices()?.into_iter().find(|invoice| invoice.id == id))
    }

    /// Purchase history of one customer.
    pub fn for_customer(&self, customer_id: &str) -> Result<Vec<Invoice>> {
        Ok(self
            .invoices()?
            .into_iter()
            .filter(|invoice| invoice.customer.id == customer_id)
            .collect())
    }

    /// Invoices handled by one employee.
    pub fn for_employee(&self, employee_id: &str) -> Result<Vec<Invoice>> {
        Ok(self
            .invoices()?
            .into_iter()
            .filter(|invoice| invoice.employee.id == employee_id)
            .collect())
    }

    /// Appends one invoice block. Existing ledger bytes are never rewritten.
    pub fn append(&self, invoice: &Invoice) -> Result<()> {
        self.store
            .write(EntityKind::Invoice, &[invoice.encode_block()], WriteMode::Append)
    }
}
