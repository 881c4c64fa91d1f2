//! Error types for the retail store.

use crate::store::EntityKind;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while reading, writing or transacting on the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read or write a data file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write a CSV report
    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    /// Update or delete referenced an id that is not on file
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// Insert collided with an id that is already on file
    #[error("{kind} {id} already exists")]
    DuplicateId { kind: EntityKind, id: String },

    /// A record failed field validation before any mutation
    #[error("Invalid {kind}: {message}")]
    Validation { kind: EntityKind, message: String },

    /// Requested quantity exceeds the stock currently on file
    #[error("Insufficient stock for product {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: u32,
        requested: u32,
    },

    /// Quantity on an invoice line must be positive
    #[error("Quantity for product {product} must be greater than zero")]
    InvalidQuantity { product: String },

    /// Commit was attempted on an invoice without lines
    #[error("Invoice must contain at least one item")]
    EmptyInvoice,

    /// Operation is not allowed in the draft's current state
    #[error("Invoice draft is {state}, expected collecting")]
    InvalidState { state: &'static str },

    /// One persisted line could not be decoded
    #[error("Cannot decode line '{line}': {message}")]
    Decode { line: String, message: String },

    /// Commit failed and every applied change was reverted
    #[error("Invoice commit rolled back: {message}")]
    TransactionFailure { message: String },
}

impl StoreError {
    /// Creates a `NotFound` error
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Creates a `DuplicateId` error
    pub fn duplicate_id(kind: EntityKind, id: &str) -> Self {
        StoreError::DuplicateId {
            kind,
            id: id.to_string(),
        }
    }

    /// Creates a `Validation` error
    pub fn validation(kind: EntityKind, message: impl Into<String>) -> Self {
        StoreError::Validation {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `Decode` error
    pub fn decode(line: &str, message: impl Into<String>) -> Self {
        StoreError::Decode {
            line: line.to_string(),
            message: message.into(),
        }
    }

    /// Returns `true` for the recoverable "id not on file" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            StoreError::not_found(EntityKind::Customer, "KH009").to_string(),
            "Customer KH009 not found"
        );
        assert_eq!(
            StoreError::duplicate_id(EntityKind::Product, "C001").to_string(),
            "Product C001 already exists"
        );
        assert_eq!(
            StoreError::InsufficientStock {
                product: "C001".to_string(),
                available: 5,
                requested: 10
            }
            .to_string(),
            "Insufficient stock for product C001: available 5, requested 10"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: StoreError = io_error.into();
        assert!(matches!(error, StoreError::Io(_)));
        assert!(!error.is_not_found());
    }
}
