//! Sales statistics computed from the invoice ledger.
//!
//! Nothing here is stored: every report replays the ledger from scratch, so the
//! figures always agree with what was actually committed.

use crate::engine::SalesEngine;
use crate::error::{Result, StoreError};
use crate::invoice::{replay_ledger, Invoice};
use crate::model::{Customer, Employee, Product};
use crate::money::Money;
use crate::store::{EntityKind, RecordStore};
use chrono::NaiveDate;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;

/// Inclusive range of calendar dates. An open end is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self> {
        if let (Some(start), Some(end)) = (from, to) {
            if start > end {
                return Err(StoreError::validation(
                    EntityKind::Invoice,
                    format!("date range starts {} after it ends {}", start, end),
                ));
            }
        }
        Ok(DateRange { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSales {
    pub customer_id: String,
    pub customer_name: String,
    pub invoices: u32,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeSales {
    pub employee_id: String,
    pub employee_name: String,
    pub invoices: u32,
    pub amount: Money,
}

/// Rows keyed by id, kept in first-seen order.
struct Tally<T> {
    rows: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Tally<T> {
    fn new() -> Self {
        Tally {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn entry(&mut self, key: &str, init: impl FnOnce() -> T) -> &mut T {
        let slot = match self.index.get(key) {
            Some(&slot) => slot,
            None => {
                self.rows.push(init());
                self.index.insert(key.to_string(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        &mut self.rows[slot]
    }
}

/// Sorts by amount descending and keeps the first `top_n` rows.
///
/// The sort is stable, so equal amounts keep their first-seen order.
/// A `top_n` of zero keeps every row.
fn ranked<T>(mut rows: Vec<T>, top_n: usize, amount: impl Fn(&T) -> Money) -> Vec<T> {
    rows.sort_by(|a, b| amount(b).cmp(&amount(a)));
    if top_n > 0 {
        rows.truncate(top_n);
    }
    rows
}

/// Aggregated sales over a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesReport {
    pub range: DateRange,
    pub invoice_count: usize,
    pub total_units: u64,
    pub total_revenue: Money,
    pub products: Vec<ProductSales>,
    pub customers: Vec<CustomerSales>,
    pub employees: Vec<EmployeeSales>,
}

impl SalesReport {
    /// Scans raw ledger lines. Malformed blocks are skipped with a warning.
    pub fn build<L: AsRef<str>>(ledger_lines: &[L], range: Option<DateRange>, top_n: usize) -> Self {
        Self::from_invoices(&replay_ledger(ledger_lines), range.unwrap_or_default(), top_n)
    }

    /// Aggregates already replayed invoices.
    pub fn from_invoices(invoices: &[Invoice], range: DateRange, top_n: usize) -> Self {
        let mut products: Tally<ProductSales> = Tally::new();
        let mut customers: Tally<CustomerSales> = Tally::new();
        let mut employees: Tally<EmployeeSales> = Tally::new();
        let mut invoice_count = 0;
        let mut total_units = 0u64;
        let mut total_revenue = Money::ZERO;

        for invoice in invoices
            .iter()
            .filter(|invoice| range.contains(invoice.timestamp.date()))
        {
            let total = invoice.total();
            invoice_count += 1;
            total_revenue += total;

            for item in &invoice.items {
                total_units += u64::from(item.quantity);
                let row = products.entry(&item.product_id, || ProductSales {
                    product_id: item.product_id.clone(),
                    product_name: item.product_name.clone(),
                    quantity: 0,
                    revenue: Money::ZERO,
                });
                row.quantity += u64::from(item.quantity);
                row.revenue += item.subtotal();
            }

            let row = customers.entry(&invoice.customer.id, || CustomerSales {
                customer_id: invoice.customer.id.clone(),
                customer_name: invoice.customer.name.clone(),
                invoices: 0,
                amount: Money::ZERO,
            });
            row.invoices += 1;
            row.amount += total;

            let row = employees.entry(&invoice.employee.id, || EmployeeSales {
                employee_id: invoice.employee.id.clone(),
                employee_name: invoice.employee.name.clone(),
                invoices: 0,
                amount: Money::ZERO,
            });
            row.invoices += 1;
            row.amount += total;
        }

        debug!(
            "Sales report: {} of {} invoice(s) in range",
            invoice_count,
            invoices.len()
        );
        SalesReport {
            range,
            invoice_count,
            total_units,
            total_revenue,
            products: ranked(products.rows, top_n, |r| r.revenue),
            customers: ranked(customers.rows, top_n, |r| r.amount),
            employees: ranked(employees.rows, top_n, |r| r.amount),
        }
    }

    /// Builds the report for everything on the engine's store, naming rows
    /// after the records currently on file.
    pub fn generate<S: RecordStore>(
        engine: &SalesEngine<S>,
        range: Option<DateRange>,
        top_n: usize,
    ) -> Result<Self> {
        let mut report = Self::build(&engine.ledger().lines()?, range, top_n);
        report.resolve_names(
            &engine.products().all()?,
            &engine.customers().all()?,
            &engine.employees().all()?,
        );
        Ok(report)
    }

    /// Replaces ledger names with current names. Ids no longer on file keep
    /// the name recorded at sale time.
    pub fn resolve_names(&mut self, products: &[Product], customers: &[Customer], employees: &[Employee]) {
        for row in &mut self.products {
            if let Some(p) = products.iter().find(|p| p.id == row.product_id) {
                row.product_name = p.name.clone();
            }
        }
        for row in &mut self.customers {
            if let Some(c) = customers.iter().find(|c| c.id == row.customer_id) {
                row.customer_name = c.name.clone();
            }
        }
        for row in &mut self.employees {
            if let Some(e) = employees.iter().find(|e| e.id == row.employee_id) {
                row.employee_name = e.name.clone();
            }
        }
    }

    /// Writes the report as CSV sections separated by a blank line:
    /// summary, products, customers, employees.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<()> {
        {
            let mut csv_writer = csv::Writer::from_writer(&mut writer);
            csv_writer.write_record(["metric", "value"])?;
            let bound = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
            csv_writer.write_record(["from".to_string(), bound(self.range.from)])?;
            csv_writer.write_record(["to".to_string(), bound(self.range.to)])?;
            csv_writer.write_record(["invoices".to_string(), self.invoice_count.to_string()])?;
            csv_writer.write_record(["units".to_string(), self.total_units.to_string()])?;
            csv_writer.write_record(["revenue".to_string(), self.total_revenue.to_string()])?;
            csv_writer.flush()?;
        }

        write_section(
            &mut writer,
            &["product_id", "product_name", "quantity", "revenue"],
            &self.products,
        )?;
        write_section(
            &mut writer,
            &["customer_id", "customer_name", "invoices", "amount"],
            &self.customers,
        )?;
        write_section(
            &mut writer,
            &["employee_id", "employee_name", "invoices", "amount"],
            &self.employees,
        )?;
        Ok(())
    }
}

fn write_section<W: Write, T: Serialize>(writer: &mut W, header: &[&str], rows: &[T]) -> Result<()> {
    writer.write_all(b"\n")?;
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(header)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{InvoiceDetail, PartyRef};
    use std::str::FromStr;

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn invoice(id: &str, d: u32, customer: &str, items: &[(&str, u32, &str)]) -> Invoice {
        Invoice {
            id: id.to_string(),
            timestamp: day(d).and_hms_opt(9, 0, 0).unwrap(),
            customer: PartyRef::new(customer, format!("Customer {}", customer)),
            employee: PartyRef::new("NV001", "Bob"),
            items: items
                .iter()
                .map(|(product, qty, price)| InvoiceDetail {
                    product_id: product.to_string(),
                    product_name: format!("Product {}", product),
                    quantity: *qty,
                    unit_price: money(price),
                })
                .collect(),
        }
    }

    fn ledger_lines(invoices: &[Invoice]) -> Vec<String> {
        invoices
            .iter()
            .flat_map(|i| i.encode_block().lines().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn test_totals_and_rankings() {
        let invoices = vec![
            invoice("HD1", 1, "KH001", &[("A001", 2, "10"), ("C001", 1, "1000")]),
            invoice("HD2", 2, "KH002", &[("A001", 5, "10")]),
            invoice("HD3", 3, "KH001", &[("A002", 1, "50")]),
        ];
        let report = SalesReport::build(&ledger_lines(&invoices), None, 5);

        assert_eq!(report.invoice_count, 3);
        assert_eq!(report.total_units, 9);
        assert_eq!(report.total_revenue, money("1120"));

        let products: Vec<(&str, u64)> = report
            .products
            .iter()
            .map(|p| (p.product_id.as_str(), p.quantity))
            .collect();
        assert_eq!(products, vec![("C001", 1), ("A001", 7), ("A002", 1)]);

        assert_eq!(report.customers[0].customer_id, "KH001");
        assert_eq!(report.customers[0].invoices, 2);
        assert_eq!(report.customers[0].amount, money("1070"));
        assert_eq!(report.employees.len(), 1);
        assert_eq!(report.employees[0].amount, report.total_revenue);
    }

    #[test]
    fn test_product_quantity_sums_past_u32() {
        let invoices = vec![
            invoice("HD1", 1, "KH001", &[("A001", u32::MAX, "0.01")]),
            invoice("HD2", 2, "KH001", &[("A001", 2, "0.01")]),
        ];
        let report = SalesReport::from_invoices(&invoices, DateRange::default(), 5);
        assert_eq!(report.products[0].quantity, u64::from(u32::MAX) + 2);
        assert_eq!(report.total_units, report.products[0].quantity);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let invoices = vec![
            invoice("HD1", 1, "KH003", &[("A003", 1, "10")]),
            invoice("HD2", 1, "KH001", &[("A001", 1, "10")]),
            invoice("HD3", 1, "KH002", &[("A002", 1, "10")]),
        ];
        let report = SalesReport::from_invoices(&invoices, DateRange::default(), 2);
        let ids: Vec<&str> = report.customers.iter().map(|c| c.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["KH003", "KH001"]);
        let ids: Vec<&str> = report.products.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["A003", "A001"]);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let invoices = vec![
            invoice("HD1", 1, "KH001", &[("A001", 1, "10")]),
            invoice("HD2", 2, "KH001", &[("A001", 1, "20")]),
            invoice("HD3", 3, "KH001", &[("A001", 1, "40")]),
        ];
        let range = DateRange::new(Some(day(2)), Some(day(3))).unwrap();
        let report = SalesReport::from_invoices(&invoices, range, 5);
        assert_eq!(report.invoice_count, 2);
        assert_eq!(report.total_revenue, money("60"));

        assert!(DateRange::new(Some(day(3)), Some(day(1))).is_err());
        assert!(DateRange::default().contains(day(30)));
    }

    #[test]
    fn test_malformed_blocks_are_skipped() {
        let mut lines = ledger_lines(&[invoice("HD1", 1, "KH001", &[("A001", 1, "10")])]);
        lines.extend(
            [
                "Invoice [ID: HD2, Date: not a date]",
                "Customer: KH002 - Eve",
                "Total: 5.00",
                "Invoice [ID: HD3, Date: 2026-10-02 09:00:00]",
                "Customer: KH002 - Eve",
                "Employee: NV001 - Bob",
                "Items:",
                "- Thing (Id: A009) x1: 5.00",
                "Total: 999.00",
            ]
            .map(str::to_string),
        );
        lines.extend(ledger_lines(&[invoice("HD4", 3, "KH003", &[("A001", 2, "10")])]));

        let report = SalesReport::build(&lines, None, 0);
        assert_eq!(report.invoice_count, 2);
        assert_eq!(report.total_revenue, money("30"));
        assert_eq!(report.products.len(), 1);
    }

    #[test]
    fn test_resolve_names_prefers_current_records() {
        let invoices = vec![invoice("HD1", 1, "KH001", &[("A001", 1, "10"), ("A404", 1, "5")])];
        let mut report = SalesReport::from_invoices(&invoices, DateRange::default(), 5);
        report.resolve_names(
            &[Product::accessory("A001", "Wireless Mouse", money("12"), 3, "Mouse")],
            &[Customer::new("KH001", "Alice", "1 Main St", "0901")],
            &[],
        );

        assert_eq!(report.products[0].product_name, "Wireless Mouse");
        assert_eq!(report.products[1].product_name, "Product A404");
        assert_eq!(report.customers[0].customer_name, "Alice");
        assert_eq!(report.employees[0].employee_name, "Bob");
    }

    #[test]
    fn test_write_csv_sections() {
        let invoices = vec![invoice("HD1", 1, "KH001", &[("A001", 3, "1299.99")])];
        let range = DateRange::new(Some(day(1)), None).unwrap();
        let report = SalesReport::from_invoices(&invoices, range, 5);

        let mut output = Vec::new();
        report.write_csv(&mut output).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.starts_with("metric,value\nfrom,2026-10-01\nto,\n"));
        assert!(output.contains("revenue,3899.97\n"));
        assert!(output.contains("\nproduct_id,product_name,quantity,revenue\nA001,Product A001,3,3899.97\n"));
        assert!(output.contains("\ncustomer_id,customer_name,invoices,amount\nKH001,Customer KH001,1,3899.97\n"));
        assert!(output.ends_with("employee_id,employee_name,invoices,amount\nNV001,Bob,1,3899.97\n"));
    }
}
