//! Invoice transaction engine.
//!
//! An invoice moves through `Collecting -> Committed | RolledBack`:
//!
//! - While collecting, every added item is checked against the stock currently
//!   on file. A rejected item leaves the draft untouched and still collecting.
//! - Commit re-reads the live product set, plans every stock decrement as a
//!   pure function over that snapshot, writes the decremented product file,
//!   and only then appends the ledger block. If the append fails, the product
//!   file is restored from the snapshot.
//! - Customer and employee aggregates are rewritten after the ledger append;
//!   the ledger stays the source of truth if that step fails.
//!
//! Stock is never touched before commit.

use crate::error::{Result, StoreError};
use crate::invoice::{Invoice, InvoiceDetail, Ledger, PartyRef};
use crate::model::{Customer, Employee, Product};
use crate::repository::{CustomerRepository, EmployeeRepository, ProductRepository, Repository};
use crate::store::{EntityKind, RecordStore};
use chrono::{Local, NaiveDateTime, SubsecRound};
use log::{debug, error, info, warn};
use std::collections::HashSet;

/// Lifecycle of an invoice draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    /// Customer and employee chosen, items being added.
    Collecting,

    /// Written to the ledger. Terminal.
    Committed,

    /// Commit failed and every applied change was reverted. Terminal.
    RolledBack,
}

impl DraftState {
    fn label(&self) -> &'static str {
        match self {
            DraftState::Collecting => "collecting",
            DraftState::Committed => "committed",
            DraftState::RolledBack => "rolled back",
        }
    }
}

/// A requested product quantity on a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
}

/// An invoice being assembled. Nothing on disk changes until commit.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    customer: Customer,
    employee: Employee,
    lines: Vec<DraftLine>,
    state: DraftState,
}

impl InvoiceDraft {
    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn employee(&self) -> &Employee {
        &self.employee
    }

    /// Requested lines; one per product id.
    pub fn lines(&self) -> &[DraftLine] {
        &self.lines
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn ensure_collecting(&self) -> Result<()> {
        match self.state {
            DraftState::Collecting => Ok(()),
            other => Err(StoreError::InvalidState {
                state: other.label(),
            }),
        }
    }
}

/// Outcome of planning a commit: the product set after decrements and the
/// invoice lines priced at sale time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPlan {
    pub products: Vec<Product>,
    pub items: Vec<InvoiceDetail>,
}

/// Plans a commit against a snapshot of the product set.
///
/// Pure: the snapshot is not modified. Every line re-resolves its product and
/// re-checks stock; the first line that fails aborts the plan, so no partial
/// decrement ever escapes this function.
pub fn plan_commit(snapshot: &[Product], lines: &[DraftLine]) -> Result<CommitPlan> {
    let mut products = snapshot.to_vec();
    let mut items = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let product = products
            .iter_mut()
            .find(|p| p.id == line.product_id)
            .ok_or_else(|| StoreError::TransactionFailure {
                message: format!(
                    "item {} ({}): product no longer exists",
                    idx + 1,
                    line.product_id
                ),
            })?;

        let available = product.quantity;
        if !product.take_stock(line.quantity) {
            return Err(StoreError::TransactionFailure {
                message: format!(
                    "item {}: {}",
                    idx + 1,
                    StoreError::InsufficientStock {
                        product: line.product_id.clone(),
                        available,
                        requested: line.quantity,
                    }
                ),
            });
        }

        items.push(InvoiceDetail {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity: line.quantity,
            unit_price: product.price,
        });
    }

    Ok(CommitPlan { products, items })
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Coordinates repositories and the ledger to create invoices.
pub struct SalesEngine<S> {
    products: ProductRepository<S>,
    customers: CustomerRepository<S>,
    employees: EmployeeRepository<S>,
    ledger: Ledger<S>,
    clock: fn() -> NaiveDateTime,
}

impl<S: RecordStore + Clone> SalesEngine<S> {
    /// Creates an engine where every component shares `store`.
    pub fn new(store: S) -> Self {
        SalesEngine {
            products: Repository::new(store.clone()),
            customers: Repository::new(store.clone()),
            employees: Repository::new(store.clone()),
            ledger: Ledger::new(store),
            clock: local_now,
        }
    }
}

impl<S: RecordStore> SalesEngine<S> {
    /// Replaces the clock used to stamp committed invoices.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn products(&self) -> &ProductRepository<S> {
        &self.products
    }

    pub fn customers(&self) -> &CustomerRepository<S> {
        &self.customers
    }

    pub fn employees(&self) -> &EmployeeRepository<S> {
        &self.employees
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn invoices(&self) -> Result<Vec<Invoice>> {
        self.ledger.invoices()
    }

    pub fn find_invoice(&self, id: &str) -> Result<Option<Invoice>> {
        self.ledger.find(id)
    }

    /// Invoices billed to `customer_id`; unknown customers are an error.
    pub fn customer_history(&self, customer_id: &str) -> Result<Vec<Invoice>> {
        if self.customers.find_by_id(customer_id)?.is_none() {
            return Err(StoreError::not_found(EntityKind::Customer, customer_id));
        }
        self.ledger.for_customer(customer_id)
    }

    pub fn employee_invoices(&self, employee_id: &str) -> Result<Vec<Invoice>> {
        self.ledger.for_employee(employee_id)
    }

    /// Starts a draft for an existing customer and employee.
    pub fn begin(&self, customer_id: &str, employee_id: &str) -> Result<InvoiceDraft> {
        let customer = self
            .customers
            .find_by_id(customer_id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Customer, customer_id))?;
        let employee = self
            .employees
            .find_by_id(employee_id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Employee, employee_id))?;

        debug!("Draft started for customer {} by employee {}", customer_id, employee_id);
        Ok(InvoiceDraft {
            customer,
            employee,
            lines: Vec::new(),
            state: DraftState::Collecting,
        })
    }

    /// Adds `quantity` units of a product to the draft.
    ///
    /// A product already on the draft is merged into its existing line, and the
    /// combined quantity is checked against stock as one request. On rejection
    /// the draft is unchanged.
    pub fn add_item(&self, draft: &mut InvoiceDraft, product_id: &str, quantity: u32) -> Result<()> {
        draft.ensure_collecting()?;
        if quantity == 0 {
            return Err(StoreError::InvalidQuantity {
                product: product_id.to_string(),
            });
        }

        let product = self
            .products
            .find_by_id(product_id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Product, product_id))?;

        let already = draft
            .lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
            .unwrap_or(0);
        let requested = already.saturating_add(quantity);
        if requested > product.quantity {
            debug!(
                "Rejected {} x{}: only {} in stock",
                product_id, requested, product.quantity
            );
            return Err(StoreError::InsufficientStock {
                product: product_id.to_string(),
                available: product.quantity,
                requested,
            });
        }

        match draft.lines.iter_mut().find(|line| line.product_id == product_id) {
            Some(line) => line.quantity = requested,
            None => draft.lines.push(DraftLine {
                product_id: product.id,
                product_name: product.name,
                quantity,
            }),
        }
        Ok(())
    }

    /// Commits the draft: decrements stock, appends the ledger entry and
    /// updates the customer and employee aggregates.
    ///
    /// An empty draft is refused and stays collecting. Any other failure moves
    /// the draft to `RolledBack` with all product quantities at their
    /// pre-commit values.
    pub fn commit(&self, draft: &mut InvoiceDraft) -> Result<Invoice> {
        draft.ensure_collecting()?;
        if draft.is_empty() {
            return Err(StoreError::EmptyInvoice);
        }

        let snapshot = self.products.all()?;
        let plan = match plan_commit(&snapshot, &draft.lines) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Commit refused: {}", e);
                draft.state = DraftState::RolledBack;
                return Err(e);
            }
        };

        // the ledger header keeps whole seconds only
        let timestamp = (self.clock)().trunc_subsecs(0);
        let invoice = Invoice {
            id: self.unused_invoice_id(timestamp)?,
            timestamp,
            customer: PartyRef::new(&draft.customer.id, &draft.customer.name),
            employee: PartyRef::new(&draft.employee.id, &draft.employee.name),
            items: plan.items,
        };

        if let Err(e) = self.products.replace_all(&plan.products) {
            draft.state = DraftState::RolledBack;
            return Err(StoreError::TransactionFailure {
                message: format!("stock update failed: {}", e),
            });
        }

        if let Err(e) = self.ledger.append(&invoice) {
            self.restore_stock(&snapshot);
            draft.state = DraftState::RolledBack;
            return Err(StoreError::TransactionFailure {
                message: format!("ledger append failed, stock restored: {}", e),
            });
        }

        let total = invoice.total();
        if let Err(e) = self.customers.record_purchase(&invoice.customer.id, total) {
            warn!("Invoice {}: customer aggregates not updated: {}", invoice.id, e);
        }
        if let Err(e) = self.employees.record_sale(&invoice.employee.id, total) {
            warn!("Invoice {}: employee aggregates not updated: {}", invoice.id, e);
        }

        draft.state = DraftState::Committed;
        info!(
            "Committed invoice {} ({} line(s), total {})",
            invoice.id,
            invoice.items.len(),
            total
        );
        Ok(invoice)
    }

    /// Puts the product file back to its pre-commit content.
    fn restore_stock(&self, snapshot: &[Product]) {
        match self.products.replace_all(snapshot) {
            Ok(()) => debug!("Restored {} product(s) after failed commit", snapshot.len()),
            Err(e) => error!("Stock rollback failed, product file may be stale: {}", e),
        }
    }

    /// Derives the invoice id from `timestamp`, suffixing `-N` on collision.
    fn unused_invoice_id(&self, timestamp: NaiveDateTime) -> Result<String> {
        let base = Invoice::id_for(timestamp);
        let taken: HashSet<String> = self.ledger.invoices()?.into_iter().map(|i| i.id).collect();
        if !taken.contains(&base) {
            return Ok(base);
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}
