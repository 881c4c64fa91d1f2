//! Integration tests for the retail-store CLI.
//!
//! These tests seed a data directory through the library, run the actual
//! binary against it and check its output.

use assert_cmd::Command;
use predicates::prelude::*;
use retail_store::{Customer, Employee, FlatFileStore, Invoice, Money, Product, SalesEngine};
use std::fs;
use std::str::FromStr;
use tempfile::TempDir;

fn money(s: &str) -> Money {
    Money::from_str(s).unwrap()
}

/// Creates a data directory with two committed invoices.
fn seeded_dir() -> (TempDir, Vec<Invoice>) {
    let dir = TempDir::new().unwrap();
    let engine = SalesEngine::new(FlatFileStore::new(dir.path()));

    engine
        .products()
        .add(Product::computer("C001", "Dell XPS", money("1299.99"), 5, "i7", "16GB", "512GB"))
        .unwrap();
    engine
        .products()
        .add(Product::accessory("A001", "Mouse", money("19.90"), 10, "Mouse"))
        .unwrap();
    engine
        .customers()
        .add(Customer::new("KH001", "Alice", "1 Main St", "0901"))
        .unwrap();
    engine
        .customers()
        .add(Customer::new("KH002", "Carol", "3 Main St", "0903"))
        .unwrap();
    engine
        .employees()
        .add(Employee::new("NV001", "Bob", "0902", "2 Main St", "Sales", money("800")))
        .unwrap();

    let mut invoices = Vec::new();

    let mut draft = engine.begin("KH001", "NV001").unwrap();
    engine.add_item(&mut draft, "C001", 3).unwrap();
    invoices.push(engine.commit(&mut draft).unwrap());

    let mut draft = engine.begin("KH002", "NV001").unwrap();
    engine.add_item(&mut draft, "A001", 2).unwrap();
    invoices.push(engine.commit(&mut draft).unwrap());

    (dir, invoices)
}

fn retail_store(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("retail-store").unwrap();
    cmd.arg("--data-dir").arg(dir.path());
    cmd
}

#[test]
fn test_report_outputs_csv_sections() {
    let (dir, _) = seeded_dir();
    let assert = retail_store(&dir).arg("report").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();

    assert!(output.starts_with("metric,value\n"));
    assert!(output.contains("invoices,2\n"));
    assert!(output.contains("units,5\n"));
    assert!(output.contains("revenue,3939.77\n"));
    assert!(output.contains("product_id,product_name,quantity,revenue\nC001,Dell XPS,3,3899.97\nA001,Mouse,2,39.80\n"));
    assert!(output.contains("customer_id,customer_name,invoices,amount\nKH001,Alice,1,3899.97\nKH002,Carol,1,39.80\n"));
    assert!(output.contains("NV001,Bob,2,3939.77\n"));
}

#[test]
fn test_report_top_limits_rankings() {
    let (dir, _) = seeded_dir();
    retail_store(&dir)
        .args(["report", "--top", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("C001,Dell XPS,3,3899.97"))
        .stdout(predicate::str::contains("A001,Mouse").not());
}

#[test]
fn test_report_range_outside_ledger_is_empty() {
    let (dir, _) = seeded_dir();
    retail_store(&dir)
        .args(["report", "--from", "2000-01-01", "--to", "2000-12-31"])
        .assert()
        .success()
        .stdout(predicate::str::contains("invoices,0\n"))
        .stdout(predicate::str::contains("revenue,0.00\n"));
}

#[test]
fn test_report_reversed_range_fails() {
    let (dir, _) = seeded_dir();
    retail_store(&dir)
        .args(["report", "--from", "2026-12-31", "--to", "2026-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
}

#[test]
fn test_report_reflects_renamed_product() {
    let (dir, _) = seeded_dir();
    let engine = SalesEngine::new(FlatFileStore::new(dir.path()));
    let mut mouse = engine.products().find_by_id("A001").unwrap().unwrap();
    mouse.name = "Wireless Mouse".to_string();
    engine.products().update(mouse).unwrap();

    retail_store(&dir)
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("A001,Wireless Mouse,2,39.80"));
}

#[test]
fn test_inventory_lists_low_stock() {
    let (dir, _) = seeded_dir();
    retail_store(&dir)
        .args(["inventory", "--threshold", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("products,2\n"))
        .stdout(predicate::str::contains("low_stock,1\n"))
        .stdout(predicate::str::contains("C001,Dell XPS,Computer,2,1299.99\n"))
        .stdout(predicate::str::contains("A001,Mouse,Accessory").not());
}

#[test]
fn test_invoice_prints_ledger_block() {
    let (dir, invoices) = seeded_dir();
    retail_store(&dir)
        .args(["invoice", &invoices[0].id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Customer: KH001 - Alice"))
        .stdout(predicate::str::contains("- Dell XPS (Id: C001) x3: 3,899.97"))
        .stdout(predicate::str::contains("Total: 3,899.97"));
}

#[test]
fn test_unknown_invoice_fails() {
    let (dir, _) = seeded_dir();
    retail_store(&dir)
        .args(["invoice", "HD000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invoice HD000000000000 not found"));
}

#[test]
fn test_history_lists_customer_invoices() {
    let (dir, invoices) = seeded_dir();
    retail_store(&dir)
        .args(["history", "KH002"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Invoice [ID: {},", invoices[1].id)))
        .stdout(predicate::str::contains("Customer: KH002 - Carol"))
        .stdout(predicate::str::contains("Customer: KH001").not());

    retail_store(&dir)
        .args(["history", "KH404"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Customer KH404 not found"));
}

#[test]
fn test_empty_data_dir_reports_zero() {
    let dir = TempDir::new().unwrap();
    retail_store(&dir)
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("invoices,0\n"));
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_missing_command_fails() {
    Command::cargo_bin("retail-store")
        .unwrap()
        .assert()
        .failure();
}
