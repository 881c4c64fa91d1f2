//! Line codec for entity records.
//!
//! Every record is persisted as a single line:
//!
//! ```text
//! <TypeTag> [Key: value, Key: value, ...]
//! ```
//!
//! Keys appear in a fixed order per tag. A field boundary is a `", "` that is
//! immediately followed by one of the tag's declared keys and `": "`, so values
//! may contain plain commas (`"12 Main St, District 1"`) without breaking the line.
//! Decoding a line never panics: anything unexpected comes back as
//! [`StoreError::Decode`] and the caller skips that single line.

use crate::error::{Result, StoreError};
use crate::model::{parse_quantity, Customer, Employee, Product, ProductKind};
use crate::money::Money;
use crate::store::EntityKind;
use std::str::FromStr;

static COMPUTER_KEYS: [&str; 7] = ["ID", "Name", "Price", "Quantity", "CPU", "RAM", "Hard Drive"];
static ACCESSORY_KEYS: [&str; 5] = ["ID", "Name", "Price", "Quantity", "Type"];
static CUSTOMER_KEYS: [&str; 6] = ["ID", "Name", "Address", "Phone", "Total Spent", "Invoices"];
static EMPLOYEE_KEYS: [&str; 8] = [
    "ID",
    "Name",
    "Phone",
    "Address",
    "Position",
    "Basic Salary",
    "Invoices",
    "Total Sales",
];

/// A record kind that can be stored as one text line.
pub trait Record: Clone + Sized {
    /// Which file this record lives in.
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Encodes the record as a single line, without a trailing newline.
    fn encode(&self) -> String;

    /// Decodes one line previously produced by [`Record::encode`].
    fn decode(line: &str) -> Result<Self>;

    /// Checks field-level constraints before the record is written.
    fn validate(&self) -> Result<()>;

    /// Case-insensitive keyword match used by repository searches.
    ///
    /// `keyword` is already lowercased.
    fn matches_keyword(&self, keyword: &str) -> bool {
        self.id().to_lowercase().contains(keyword) || self.name().to_lowercase().contains(keyword)
    }
}

/// The parsed form of one `Tag [Key: value, ...]` line.
#[derive(Debug)]
pub struct FieldLine<'a> {
    line: &'a str,
    pub tag: &'a str,
    fields: Vec<(&'a str, &'a str)>,
}

impl<'a> FieldLine<'a> {
    /// Splits a line into its tag and key/value pairs.
    ///
    /// `keys_for` maps a tag to the keys it declares; unknown tags are rejected.
    pub fn parse(line: &'a str, keys_for: impl Fn(&str) -> Option<&'static [&'static str]>) -> Result<Self> {
        let trimmed = line.trim();
        let open = trimmed
            .find('[')
            .ok_or_else(|| StoreError::decode(line, "missing '['"))?;
        let close = trimmed
            .rfind(']')
            .filter(|close| *close > open)
            .ok_or_else(|| StoreError::decode(line, "missing ']'"))?;

        let tag = trimmed[..open].trim();
        let keys = keys_for(tag)
            .ok_or_else(|| StoreError::decode(line, format!("unknown type tag '{}'", tag)))?;
        let body = &trimmed[open + 1..close];

        let mut fields = Vec::with_capacity(keys.len());
        let mut cursor = 0;
        while cursor < body.len() {
            let rest = &body[cursor..];
            let key = leading_key(rest, keys)
                .ok_or_else(|| StoreError::decode(line, format!("unexpected field at '{}'", rest)))?;
            let value_start = cursor + key.len() + 2;
            let value_end = next_boundary(body, value_start, keys).unwrap_or(body.len());
            fields.push((key, body[value_start..value_end].trim()));
            cursor = (value_end + 2).min(body.len());
        }

        Ok(FieldLine { line, tag, fields })
    }

    /// Returns the value for `key`, if present.
    pub fn optional(&self, key: &str) -> Option<&'a str> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// Returns the value for `key`, failing the line if it is absent.
    pub fn required(&self, key: &str) -> Result<&'a str> {
        self.optional(key)
            .ok_or_else(|| StoreError::decode(self.line, format!("missing field '{}'", key)))
    }

    pub fn money(&self, key: &str) -> Result<Money> {
        let raw = self.required(key)?;
        Money::from_str(raw)
            .map_err(|e| StoreError::decode(self.line, format!("bad amount '{}' in {}: {}", raw, key, e)))
    }

    pub fn quantity(&self, key: &str) -> Result<u32> {
        let raw = self.required(key)?;
        parse_quantity(raw)
            .ok_or_else(|| StoreError::decode(self.line, format!("bad quantity '{}' in {}", raw, key)))
    }

    /// Like [`FieldLine::money`] but defaults to zero when the field is absent.
    pub fn money_or_zero(&self, key: &str) -> Result<Money> {
        match self.optional(key) {
            Some(_) => self.money(key),
            None => Ok(Money::ZERO),
        }
    }

    /// Like [`FieldLine::quantity`] but defaults to zero when the field is absent.
    pub fn quantity_or_zero(&self, key: &str) -> Result<u32> {
        match self.optional(key) {
            Some(_) => self.quantity(key),
            None => Ok(0),
        }
    }
}

fn leading_key(rest: &str, keys: &[&'static str]) -> Option<&'static str> {
    keys.iter()
        .filter(|key| rest.starts_with(**key) && rest[key.len()..].starts_with(": "))
        .max_by_key(|key| key.len())
        .copied()
}

/// Finds the next `", "` after `from` that introduces a declared key.
fn next_boundary(body: &str, from: usize, keys: &[&'static str]) -> Option<usize> {
    let mut search = from;
    while let Some(offset) = body[search..].find(", ") {
        let at = search + offset;
        if leading_key(&body[at + 2..], keys).is_some() {
            return Some(at);
        }
        search = at + 2;
    }
    None
}

/// Writes `Tag [Key: value, ...]`.
pub fn encode_fields(tag: &str, fields: &[(&str, String)]) -> String {
    let body: Vec<String> = fields
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect();
    format!("{} [{}]", tag, body.join(", "))
}

/// Rejects text values that would not survive a round trip through the line format.
fn check_text(kind: EntityKind, field: &str, value: &str, keys: &[&'static str]) -> Result<()> {
    if value.contains('\n') || value.contains('\r') {
        return Err(StoreError::validation(kind, format!("{} must not contain line breaks", field)));
    }
    if value.trim() != value {
        return Err(StoreError::validation(
            kind,
            format!("{} must not start or end with whitespace", field),
        ));
    }
    if next_boundary(value, 0, keys).is_some() {
        return Err(StoreError::validation(
            kind,
            format!("{} must not contain a ', <field>: ' sequence", field),
        ));
    }
    Ok(())
}

/// Rejects ids containing a separator used by the invoice ledger lines.
fn check_ledger_id(kind: EntityKind, id: &str, separators: &[&str]) -> Result<()> {
    match separators.iter().find(|sep| id.contains(**sep)) {
        Some(sep) => Err(StoreError::validation(
            kind,
            format!("id must not contain '{}'", sep),
        )),
        None => Ok(()),
    }
}

fn check_identity(kind: EntityKind, id: &str, name: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(StoreError::validation(kind, "id must not be blank"));
    }
    if name.trim().is_empty() {
        return Err(StoreError::validation(kind, "name must not be blank"));
    }
    Ok(())
}

fn product_keys(tag: &str) -> Option<&'static [&'static str]> {
    match tag {
        "Computer" => Some(&COMPUTER_KEYS[..]),
        "Accessory" => Some(&ACCESSORY_KEYS[..]),
        _ => None,
    }
}

impl Record for Product {
    const KIND: EntityKind = EntityKind::Product;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self) -> String {
        let mut fields = vec![
            ("ID", self.id.clone()),
            ("Name", self.name.clone()),
            ("Price", self.price.grouped()),
            ("Quantity", self.quantity.to_string()),
        ];
        match &self.kind {
            ProductKind::Computer {
                cpu,
                ram,
                hard_drive,
            } => {
                fields.push(("CPU", cpu.clone()));
                fields.push(("RAM", ram.clone()));
                fields.push(("Hard Drive", hard_drive.clone()));
            }
            ProductKind::Accessory { accessory_type } => {
                fields.push(("Type", accessory_type.clone()));
            }
        }
        encode_fields(self.kind.tag(), &fields)
    }

    fn decode(line: &str) -> Result<Self> {
        let parsed = FieldLine::parse(line, product_keys)?;
        let kind = match parsed.tag {
            "Computer" => ProductKind::Computer {
                cpu: parsed.required("CPU")?.to_string(),
                ram: parsed.required("RAM")?.to_string(),
                hard_drive: parsed.required("Hard Drive")?.to_string(),
            },
            _ => ProductKind::Accessory {
                accessory_type: parsed.required("Type")?.to_string(),
            },
        };

        Ok(Product {
            id: parsed.required("ID")?.to_string(),
            name: parsed.required("Name")?.to_string(),
            price: parsed.money("Price")?,
            quantity: parsed.quantity("Quantity")?,
            kind,
        })
    }

    fn validate(&self) -> Result<()> {
        check_identity(Self::KIND, &self.id, &self.name)?;
        if !self.price.is_positive() {
            return Err(StoreError::validation(Self::KIND, "price must be greater than zero"));
        }

        let keys: &[&'static str] = match self.kind {
            ProductKind::Computer { .. } => &COMPUTER_KEYS,
            ProductKind::Accessory { .. } => &ACCESSORY_KEYS,
        };
        check_text(Self::KIND, "id", &self.id, keys)?;
        check_ledger_id(Self::KIND, &self.id, &[" (Id: ", ") x"])?;
        check_text(Self::KIND, "name", &self.name, keys)?;
        match &self.kind {
            ProductKind::Computer {
                cpu,
                ram,
                hard_drive,
            } => {
                check_text(Self::KIND, "cpu", cpu, keys)?;
                check_text(Self::KIND, "ram", ram, keys)?;
                check_text(Self::KIND, "hard drive", hard_drive, keys)
            }
            ProductKind::Accessory { accessory_type } => {
                check_text(Self::KIND, "type", accessory_type, keys)
            }
        }
    }

    fn matches_keyword(&self, keyword: &str) -> bool {
        let variant_hit = match &self.kind {
            ProductKind::Computer {
                cpu,
                ram,
                hard_drive,
            } => [cpu, ram, hard_drive]
                .iter()
                .any(|field| field.to_lowercase().contains(keyword)),
            ProductKind::Accessory { accessory_type } => {
                accessory_type.to_lowercase().contains(keyword)
            }
        };
        variant_hit
            || self.id.to_lowercase().contains(keyword)
            || self.name.to_lowercase().contains(keyword)
    }
}

fn customer_keys(tag: &str) -> Option<&'static [&'static str]> {
    (tag == "Customer").then_some(&CUSTOMER_KEYS[..])
}

impl Record for Customer {
    const KIND: EntityKind = EntityKind::Customer;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self) -> String {
        encode_fields(
            "Customer",
            &[
                ("ID", self.id.clone()),
                ("Name", self.name.clone()),
                ("Address", self.address.clone()),
                ("Phone", self.phone.clone()),
                ("Total Spent", self.total_spent.grouped()),
                ("Invoices", self.invoice_count.to_string()),
            ],
        )
    }

    fn decode(line: &str) -> Result<Self> {
        let parsed = FieldLine::parse(line, customer_keys)?;
        Ok(Customer {
            id: parsed.required("ID")?.to_string(),
            name: parsed.required("Name")?.to_string(),
            address: parsed.required("Address")?.to_string(),
            phone: parsed.required("Phone")?.to_string(),
            total_spent: parsed.money_or_zero("Total Spent")?,
            invoice_count: parsed.quantity_or_zero("Invoices")?,
        })
    }

    fn validate(&self) -> Result<()> {
        check_identity(Self::KIND, &self.id, &self.name)?;
        check_text(Self::KIND, "id", &self.id, &CUSTOMER_KEYS)?;
        check_ledger_id(Self::KIND, &self.id, &[" - "])?;
        check_text(Self::KIND, "name", &self.name, &CUSTOMER_KEYS)?;
        check_text(Self::KIND, "address", &self.address, &CUSTOMER_KEYS)?;
        check_text(Self::KIND, "phone", &self.phone, &CUSTOMER_KEYS)
    }

    fn matches_keyword(&self, keyword: &str) -> bool {
        self.id.to_lowercase().contains(keyword)
            || self.name.to_lowercase().contains(keyword)
            || self.phone.contains(keyword)
            || self.address.to_lowercase().contains(keyword)
    }
}

fn employee_keys(tag: &str) -> Option<&'static [&'static str]> {
    (tag == "Employee").then_some(&EMPLOYEE_KEYS[..])
}

impl Record for Employee {
    const KIND: EntityKind = EntityKind::Employee;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self) -> String {
        encode_fields(
            "Employee",
            &[
                ("ID", self.id.clone()),
                ("Name", self.name.clone()),
                ("Phone", self.phone.clone()),
                ("Address", self.address.clone()),
                ("Position", self.position.clone()),
                ("Basic Salary", self.basic_salary.grouped()),
                ("Invoices", self.invoice_count.to_string()),
                ("Total Sales", self.total_sales.grouped()),
            ],
        )
    }

    fn decode(line: &str) -> Result<Self> {
        let parsed = FieldLine::parse(line, employee_keys)?;
        Ok(Employee {
            id: parsed.required("ID")?.to_string(),
            name: parsed.required("Name")?.to_string(),
            phone: parsed.optional("Phone").unwrap_or_default().to_string(),
            address: parsed.optional("Address").unwrap_or_default().to_string(),
            position: parsed.optional("Position").unwrap_or_default().to_string(),
            basic_salary: parsed.money("Basic Salary")?,
            invoice_count: parsed.quantity_or_zero("Invoices")?,
            total_sales: parsed.money_or_zero("Total Sales")?,
        })
    }

    fn validate(&self) -> Result<()> {
        check_identity(Self::KIND, &self.id, &self.name)?;
        if self.basic_salary.is_negative() {
            return Err(StoreError::validation(Self::KIND, "basic salary must not be negative"));
        }
        check_text(Self::KIND, "id", &self.id, &EMPLOYEE_KEYS)?;
        check_ledger_id(Self::KIND, &self.id, &[" - "])?;
        check_text(Self::KIND, "name", &self.name, &EMPLOYEE_KEYS)?;
        check_text(Self::KIND, "phone", &self.phone, &EMPLOYEE_KEYS)?;
        check_text(Self::KIND, "address", &self.address, &EMPLOYEE_KEYS)?;
        check_text(Self::KIND, "position", &self.position, &EMPLOYEE_KEYS)
    }

    fn matches_keyword(&self, keyword: &str) -> bool {
        self.id.to_lowercase().contains(keyword)
            || self.name.to_lowercase().contains(keyword)
            || self.phone.contains(keyword)
            || self.position.to_lowercase().contains(keyword)
    }
}
