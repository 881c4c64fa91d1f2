//! CRUD over one entity kind.
//!
//! A repository holds no records of its own: every call re-reads the backing
//! file through the [`RecordStore`], acts on the decoded records and writes the
//! result back. The file is therefore always the current state.

use crate::codec::Record;
use crate::error::{Result, StoreError};
use crate::model::{Customer, Employee, Product};
use crate::money::Money;
use crate::store::{RecordStore, WriteMode};
use log::{debug, info};
use std::io::Write;
use std::marker::PhantomData;

/// Generic repository for records of type `R` on store `S`.
#[derive(Debug, Clone)]
pub struct Repository<R, S> {
    store: S,
    _record: PhantomData<fn() -> R>,
}

pub type ProductRepository<S> = Repository<Product, S>;
pub type CustomerRepository<S> = Repository<Customer, S>;
pub type EmployeeRepository<S> = Repository<Employee, S>;

impl<R: Record, S: RecordStore> Repository<R, S> {
    pub fn new(store: S) -> Self {
        Repository {
            store,
            _record: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every decodable record, in file order.
    pub fn all(&self) -> Result<Vec<R>> {
        self.store.load()
    }

    /// First record whose id equals `id`. A missing id is `Ok(None)`.
    pub fn find_by_id(&self, id: &str) -> Result<Option<R>> {
        Ok(self.all()?.into_iter().find(|r| r.id() == id))
    }

    /// Records whose name contains `fragment`, ignoring case.
    pub fn find_by_name(&self, fragment: &str) -> Result<Vec<R>> {
        let needle = fragment.to_lowercase();
        Ok(self
            .all()?
            .into_iter()
            .filter(|r| r.name().to_lowercase().contains(&needle))
            .collect())
    }

    /// Records matching `keyword` on any searchable field, ignoring case.
    pub fn search(&self, keyword: &str) -> Result<Vec<R>> {
        let needle = keyword.trim().to_lowercase();
        Ok(self
            .all()?
            .into_iter()
            .filter(|r| r.matches_keyword(&needle))
            .collect())
    }

    /// Appends a new record.
    ///
    /// Fails with `DuplicateId` if the id is already on file.
    pub fn add(&self, record: R) -> Result<()> {
        record.validate()?;
        if self.find_by_id(record.id())?.is_some() {
            return Err(StoreError::duplicate_id(R::KIND, record.id()));
        }
        self.store.save(std::slice::from_ref(&record), WriteMode::Append)?;
        info!("Added {} {}", R::KIND, record.id());
        Ok(())
    }

    /// Replaces the record with the same id and rewrites the file.
    pub fn update(&self, record: R) -> Result<()> {
        record.validate()?;
        let mut records = self.all()?;
        let mut replaced = false;
        for slot in records.iter_mut().filter(|r| r.id() == record.id()) {
            *slot = record.clone();
            replaced = true;
        }
        if !replaced {
            return Err(StoreError::not_found(R::KIND, record.id()));
        }
        self.store.save(&records, WriteMode::Overwrite)?;
        info!("Updated {} {}", R::KIND, record.id());
        Ok(())
    }

    /// Removes the record with `id` and rewrites the file.
    ///
    /// If nothing matches, the file is left untouched and `NotFound` is returned.
    pub fn delete(&self, id: &str) -> Result<R> {
        let (removed, kept): (Vec<R>, Vec<R>) = self.all()?.into_iter().partition(|r| r.id() == id);
        let Some(first) = removed.into_iter().next() else {
            return Err(StoreError::not_found(R::KIND, id));
        };
        self.store.save(&kept, WriteMode::Overwrite)?;
        info!("Deleted {} {}", R::KIND, id);
        Ok(first)
    }

    /// Rewrites the whole file with `records`, in the given order.
    pub fn replace_all(&self, records: &[R]) -> Result<()> {
        self.store.save(records, WriteMode::Overwrite)
    }

    /// Next sequential id of the form `<prefix><NNN>`, e.g. `KH004`.
    ///
    /// Ids that do not follow the pattern are ignored.
    pub fn next_id(&self, prefix: &str) -> Result<String> {
        let max = self
            .all()?
            .iter()
            .filter_map(|r| r.id().strip_prefix(prefix))
            .filter_map(|digits| digits.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Ok(format!("{}{:03}", prefix, max + 1))
    }
}

/// Stock overview of the product file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySummary {
    pub total_products: usize,
    pub computers: usize,
    pub accessories: usize,
    pub low_stock: Vec<Product>,
    pub stock_value: Money,
}

impl InventorySummary {
    /// Writes the counts followed by the low-stock products as CSV.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<()> {
        {
            let mut csv_writer = csv::Writer::from_writer(&mut writer);
            csv_writer.write_record(["metric", "value"])?;
            csv_writer.write_record(["products".to_string(), self.total_products.to_string()])?;
            csv_writer.write_record(["computers".to_string(), self.computers.to_string()])?;
            csv_writer.write_record(["accessories".to_string(), self.accessories.to_string()])?;
            csv_writer.write_record(["low_stock".to_string(), self.low_stock.len().to_string()])?;
            csv_writer.write_record(["stock_value".to_string(), self.stock_value.to_string()])?;
            csv_writer.flush()?;
        }

        writer.write_all(b"\n")?;
        let mut csv_writer = csv::Writer::from_writer(&mut writer);
        csv_writer.write_record(["id", "name", "kind", "quantity", "price"])?;
        for product in &self.low_stock {
            csv_writer.write_record([
                product.id.clone(),
                product.name.clone(),
                product.kind.tag().to_string(),
                product.quantity.to_string(),
                product.price.to_string(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

impl<S: RecordStore> Repository<Product, S> {
    pub fn computers(&self) -> Result<Vec<Product>> {
        Ok(self.all()?.into_iter().filter(Product::is_computer).collect())
    }

    pub fn accessories(&self) -> Result<Vec<Product>> {
        Ok(self.all()?.into_iter().filter(Product::is_accessory).collect())
    }

    /// Products with `quantity <= threshold`.
    pub fn low_stock(&self, threshold: u32) -> Result<Vec<Product>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|p| p.quantity <= threshold)
            .collect())
    }

    /// Sum of `price * quantity` over every product.
    pub fn inventory_value(&self) -> Result<Money> {
        Ok(self.all()?.iter().map(Product::stock_value).sum())
    }

    /// Counts, stock value and low-stock list from a single read.
    pub fn inventory_summary(&self, low_stock_threshold: u32) -> Result<InventorySummary> {
        let products = self.all()?;
        Ok(InventorySummary {
            total_products: products.len(),
            computers: products.iter().filter(|p| p.is_computer()).count(),
            accessories: products.iter().filter(|p| p.is_accessory()).count(),
            stock_value: products.iter().map(Product::stock_value).sum(),
            low_stock: products
                .into_iter()
                .filter(|p| p.quantity <= low_stock_threshold)
                .collect(),
        })
    }

    /// Products on file that would fail validation today (e.g. hand-edited prices).
    pub fn invalid_products(&self) -> Result<Vec<Product>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|p| p.validate().is_err())
            .collect())
    }
}

impl<S: RecordStore> Repository<Customer, S> {
    /// Adds one committed invoice to the customer's aggregates.
    pub fn record_purchase(&self, id: &str, amount: Money) -> Result<Customer> {
        let mut customer = self
            .find_by_id(id)?
            .ok_or_else(|| StoreError::not_found(Customer::KIND, id))?;
        customer.record_purchase(amount);
        self.update(customer.clone())?;
        debug!("Customer {} total spent now {}", id, customer.total_spent);
        Ok(customer)
    }
}

impl<S: RecordStore> Repository<Employee, S> {
    /// Adds one committed invoice to the employee's aggregates.
    pub fn record_sale(&self, id: &str, amount: Money) -> Result<Employee> {
        let mut employee = self
            .find_by_id(id)?
            .ok_or_else(|| StoreError::not_found(Employee::KIND, id))?;
        employee.record_sale(amount);
        self.update(employee.clone())?;
        debug!("Employee {} total sales now {}", id, employee.total_sales);
        Ok(employee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CustomerRank;
    use crate::store::{EntityKind, MemoryStore};
    use std::str::FromStr;

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn products() -> ProductRepository<MemoryStore> {
        Repository::new(MemoryStore::new())
    }

    #[test]
    fn test_add_then_find_by_id() {
        let repo = products();
        let dell = Product::computer("C001", "Dell XPS", money("1299.99"), 5, "i7", "16GB", "512GB");
        repo.add(dell.clone()).unwrap();

        assert_eq!(repo.find_by_id("C001").unwrap(), Some(dell));
        assert_eq!(repo.find_by_id("C999").unwrap(), None);
    }

    #[test]
    fn test_add_rejects_duplicate_and_invalid() {
        let repo = products();
        repo.add(Product::accessory("A001", "Mouse", money("10"), 1, "Mouse"))
            .unwrap();

        let err = repo
            .add(Product::accessory("A001", "Other", money("10"), 1, "Mouse"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { kind: EntityKind::Product, .. }));

        let err = repo
            .add(Product::accessory("A002", "Free", Money::ZERO, 1, "Mouse"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(repo.all().unwrap().len(), 1);
    }

    #[test]
    fn test_update_and_delete() {
        let repo = products();
        repo.add(Product::accessory("A001", "Mouse", money("10"), 1, "Mouse"))
            .unwrap();
        repo.add(Product::accessory("A002", "Pad", money("5"), 2, "Pad"))
            .unwrap();

        let mut pad = repo.find_by_id("A002").unwrap().unwrap();
        pad.price = money("6.50");
        repo.update(pad).unwrap();
        assert_eq!(repo.find_by_id("A002").unwrap().unwrap().price, money("6.50"));

        let missing = Product::accessory("A404", "Ghost", money("1"), 1, "None");
        assert!(repo.update(missing).unwrap_err().is_not_found());

        let removed = repo.delete("A001").unwrap();
        assert_eq!(removed.name, "Mouse");
        assert!(repo.delete("A001").unwrap_err().is_not_found());
        assert_eq!(repo.all().unwrap().len(), 1);
    }

    #[test]
    fn test_find_by_name_is_case_insensitive() {
        let repo = products();
        repo.add(Product::accessory("A001", "Wireless Mouse", money("10"), 1, "Mouse"))
            .unwrap();
        repo.add(Product::accessory("A002", "Keyboard", money("20"), 1, "Keyboard"))
            .unwrap();

        let found = repo.find_by_name("MOUSE").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "A001");
        assert!(repo.find_by_name("monitor").unwrap().is_empty());
    }

    #[test]
    fn test_product_search_and_kind_split() {
        let repo = products();
        repo.add(Product::computer("C001", "Dell XPS", money("1000"), 2, "i7", "16GB", "512GB"))
            .unwrap();
        repo.add(Product::computer("C002", "HP Envy", money("900"), 3, "Ryzen 5", "8GB", "256GB"))
            .unwrap();
        repo.add(Product::accessory("A001", "Mouse", money("10"), 50, "Wireless"))
            .unwrap();

        let hits = repo.search("  I7 ").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "C001");
        assert_eq!(repo.search("wireless").unwrap()[0].id, "A001");
        assert_eq!(repo.search("c00").unwrap().len(), 2);
        assert!(repo.search("thinkpad").unwrap().is_empty());

        let computers: Vec<String> = repo.computers().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(computers, vec!["C001", "C002"]);
        let accessories: Vec<String> = repo.accessories().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(accessories, vec!["A001"]);
    }

    #[test]
    fn test_customer_and_employee_search() {
        let customers: CustomerRepository<MemoryStore> = Repository::new(MemoryStore::new());
        customers
            .add(Customer::new("KH001", "Alice", "12 Main St, District 1", "0901234567"))
            .unwrap();
        customers
            .add(Customer::new("KH002", "Bob", "7 Lake Rd", "0987654321"))
            .unwrap();

        let by_phone = customers.search("0987").unwrap();
        assert_eq!(by_phone.len(), 1);
        assert_eq!(by_phone[0].id, "KH002");
        let by_address = customers.search("district").unwrap();
        assert_eq!(by_address.len(), 1);
        assert_eq!(by_address[0].id, "KH001");

        let employees: EmployeeRepository<MemoryStore> = Repository::new(customers.store().clone());
        employees
            .add(Employee::new("NV001", "Carol", "0900", "1 Side St", "Sales", money("800")))
            .unwrap();
        assert_eq!(employees.search("carol").unwrap().len(), 1);
        assert!(employees.search("alice").unwrap().is_empty());
    }

    #[test]
    fn test_inventory_summary() {
        let repo = products();
        repo.add(Product::computer("C001", "Dell XPS", money("1000"), 2, "i7", "16GB", "512GB"))
            .unwrap();
        repo.add(Product::accessory("A001", "Mouse", money("10"), 50, "Mouse"))
            .unwrap();

        let summary = repo.inventory_summary(5).unwrap();
        assert_eq!(summary.total_products, 2);
        assert_eq!(summary.computers, 1);
        assert_eq!(summary.accessories, 1);
        assert_eq!(summary.stock_value.to_string(), "2500.00");
        assert_eq!(summary.low_stock.len(), 1);
        assert_eq!(summary.low_stock[0].id, "C001");
        assert_eq!(repo.inventory_value().unwrap(), summary.stock_value);
        assert!(repo.invalid_products().unwrap().is_empty());

        let mut output = Vec::new();
        summary.write_csv(&mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("stock_value,2500.00\n"));
        assert!(output.ends_with("id,name,kind,quantity,price\nC001,Dell XPS,Computer,2,1000.00\n"));
    }

    #[test]
    fn test_customer_next_id_and_purchase() {
        let repo: CustomerRepository<MemoryStore> = Repository::new(MemoryStore::new());
        assert_eq!(repo.next_id("KH").unwrap(), "KH001");

        repo.add(Customer::new("KH001", "Alice", "1 Main St", "0901"))
            .unwrap();
        repo.add(Customer::new("KH007", "Bob", "2 Main St", "0902"))
            .unwrap();
        repo.add(Customer::new("VIP", "Carol", "3 Main St", "0903"))
            .unwrap();
        assert_eq!(repo.next_id("KH").unwrap(), "KH008");

        let alice = repo.record_purchase("KH001", money("1500")).unwrap();
        assert_eq!(alice.rank(), CustomerRank::Silver);
        let reloaded = repo.find_by_id("KH001").unwrap().unwrap();
        assert_eq!(reloaded.invoice_count, 1);
        assert_eq!(reloaded.total_spent, money("1500"));

        assert!(repo.record_purchase("KH404", money("1")).unwrap_err().is_not_found());
    }
}
