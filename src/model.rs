//! Domain records persisted by the store.
//!
//! Products are a tagged variant: the shared fields live on [`Product`] and the
//! per-variant payload on [`ProductKind`]. Customers and employees carry the
//! aggregate fields the invoice engine rewrites after every committed sale.

use crate::money::Money;
use std::fmt;
use std::str::FromStr;

/// Variant payload of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductKind {
    /// A complete machine.
    Computer {
        cpu: String,
        ram: String,
        hard_drive: String,
    },

    /// Anything sold alongside a machine (mouse, keyboard, cable...).
    Accessory { accessory_type: String },
}

impl ProductKind {
    /// Type tag written at the start of the persisted line.
    pub fn tag(&self) -> &'static str {
        match self {
            ProductKind::Computer { .. } => "Computer",
            ProductKind::Accessory { .. } => "Accessory",
        }
    }
}

/// A sellable item with its current stock level.
///
/// # Invariants
///
/// - `id` is unique among products
/// - `price` is strictly positive
/// - `quantity` can never go below zero (enforced by `u32`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
    pub kind: ProductKind,
}

impl Product {
    /// Creates a computer product.
    pub fn computer(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        quantity: u32,
        cpu: impl Into<String>,
        ram: impl Into<String>,
        hard_drive: impl Into<String>,
    ) -> Self {
        Product {
            id: id.into(),
            name: name.into(),
            price,
            quantity,
            kind: ProductKind::Computer {
                cpu: cpu.into(),
                ram: ram.into(),
                hard_drive: hard_drive.into(),
            },
        }
    }

    /// Creates an accessory product.
    pub fn accessory(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        quantity: u32,
        accessory_type: impl Into<String>,
    ) -> Self {
        Product {
            id: id.into(),
            name: name.into(),
            price,
            quantity,
            kind: ProductKind::Accessory {
                accessory_type: accessory_type.into(),
            },
        }
    }

    pub fn is_computer(&self) -> bool {
        matches!(self.kind, ProductKind::Computer { .. })
    }

    pub fn is_accessory(&self) -> bool {
        matches!(self.kind, ProductKind::Accessory { .. })
    }

    /// Value of the stock on hand.
    pub fn stock_value(&self) -> Money {
        self.price.times(self.quantity)
    }

    /// Removes `requested` units from stock.
    ///
    /// Returns `false` and leaves the quantity unchanged if fewer units are on hand.
    pub fn take_stock(&mut self, requested: u32) -> bool {
        match self.quantity.checked_sub(requested) {
            Some(remaining) => {
                self.quantity = remaining;
                true
            }
            None => false,
        }
    }
}

/// Loyalty tier derived from a customer's cumulative spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CustomerRank {
    Regular,
    Silver,
    Gold,
    Platinum,
}

impl CustomerRank {
    /// Maps a cumulative spend onto its tier.
    pub fn for_spend(total_spent: Money) -> Self {
        if total_spent >= Money::from_cents(2_000_000) {
            CustomerRank::Platinum
        } else if total_spent >= Money::from_cents(500_000) {
            CustomerRank::Gold
        } else if total_spent >= Money::from_cents(100_000) {
            CustomerRank::Silver
        } else {
            CustomerRank::Regular
        }
    }
}

impl fmt::Display for CustomerRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CustomerRank::Regular => "Regular",
            CustomerRank::Silver => "Silver",
            CustomerRank::Gold => "Gold",
            CustomerRank::Platinum => "Platinum",
        };
        f.write_str(label)
    }
}

/// A shop customer and their purchase aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone: String,

    /// Sum of all committed invoice totals for this customer.
    pub total_spent: Money,

    /// Number of committed invoices for this customer.
    pub invoice_count: u32,
}

impl Customer {
    /// Creates a customer with no purchase history.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Customer {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            phone: phone.into(),
            total_spent: Money::ZERO,
            invoice_count: 0,
        }
    }

    pub fn rank(&self) -> CustomerRank {
        CustomerRank::for_spend(self.total_spent)
    }

    /// Folds one committed invoice into the aggregates.
    pub fn record_purchase(&mut self, amount: Money) {
        self.total_spent += amount;
        self.invoice_count += 1;
    }
}

/// A member of staff who can be credited with sales.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub position: String,
    pub basic_salary: Money,

    /// Number of committed invoices handled.
    pub invoice_count: u32,

    /// Sum of committed invoice totals handled.
    pub total_sales: Money,
}

impl Employee {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
        position: impl Into<String>,
        basic_salary: Money,
    ) -> Self {
        Employee {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            address: address.into(),
            position: position.into(),
            basic_salary,
            invoice_count: 0,
            total_sales: Money::ZERO,
        }
    }

    /// Folds one committed invoice into the aggregates.
    pub fn record_sale(&mut self, amount: Money) {
        self.total_sales += amount;
        self.invoice_count += 1;
    }
}

/// Parses a quantity field, tolerating thousands separators.
pub(crate) fn parse_quantity(raw: &str) -> Option<u32> {
    let digits: String = raw.trim().chars().filter(|c| *c != ',').collect();
    u32::from_str(&digits).ok()
}
