//! Custom error types for hazina
//!
//! This module defines the error hierarchy for the ledger core using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

use crate::models::{EntryId, Money, TransferId};

/// The main error type for hazina operations
#[derive(Error, Debug)]
pub enum HazinaError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for data models
    #[error("Validation error: {0}")]
    Validation(String),

    /// Amount is zero, negative, or not a number
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A transfer was requested without a destination pool
    #[error("No destination selected for allocation")]
    NoDestinationSelected,

    /// Transaction creation against a closed budget
    #[error("Budget {0} is closed")]
    ClosedBudget(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Insufficient funds
    #[error("Insufficient funds in {pool}: need {needed}, have {available}")]
    InsufficientFunds {
        pool: String,
        needed: Money,
        available: Money,
    },

    /// A multi-write operation stopped after some writes succeeded
    #[error("Reconciliation needed for transfer {transfer_id}: {detail}")]
    ReconciliationNeeded {
        transfer_id: TransferId,
        written: Vec<EntryId>,
        detail: String,
    },

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl HazinaError {
    /// Create a "not found" error for transactions
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for budgets
    pub fn budget_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Budget",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for chamas
    pub fn chama_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Chama",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a duplicate error
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Check if this error was raised before any write happened
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvalidAmount(_)
                | Self::NoDestinationSelected
                | Self::ClosedBudget(_)
                | Self::NotFound { .. }
                | Self::InsufficientFunds { .. }
        )
    }
}

impl From<std::io::Error> for HazinaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HazinaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for hazina operations
pub type HazinaResult<T> = Result<T, HazinaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HazinaError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = HazinaError::chama_not_found("chm-1234abcd");
        assert_eq!(err.to_string(), "Chama not found: chm-1234abcd");
        assert!(err.is_not_found());
        assert!(err.is_precondition());
    }

    #[test]
    fn test_insufficient_funds_error() {
        let err = HazinaError::InsufficientFunds {
            pool: "chama pool".into(),
            needed: Money::from_cents(300_000),
            available: Money::from_cents(200_000),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds in chama pool: need KES 3,000.00, have KES 2,000.00"
        );
    }

    #[test]
    fn test_reconciliation_is_not_precondition() {
        let err = HazinaError::ReconciliationNeeded {
            transfer_id: TransferId::new(),
            written: vec![EntryId::new()],
            detail: "destination write failed".into(),
        };
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HazinaError = io_err.into();
        assert!(matches!(err, HazinaError::Io(_)));
    }
}
