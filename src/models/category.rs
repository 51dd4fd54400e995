//! Budget category model
//!
//! A category is a named line in a monthly budget with a planned amount and
//! an explicit tag describing how analysis treats money booked against it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;

/// How analysis interprets a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryTag {
    /// Ordinary spending (planned minus actual)
    #[default]
    Expense,
    /// Money set aside into savings
    Savings,
    /// Inflow that reduces net outflow (planned plus actual)
    Recovered,
    /// Informational outflow, always shown as a deficit
    Lost,
}

impl CategoryTag {
    /// Infer a tag from a legacy category name
    ///
    /// Case-insensitive substring match on "lost", "recovered" and "saving".
    /// Only used when a budget is created without explicit tags.
    pub fn infer(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("lost") {
            Self::Lost
        } else if lower.contains("recovered") {
            Self::Recovered
        } else if lower.contains("saving") {
            Self::Savings
        } else {
            Self::Expense
        }
    }

    pub fn is_inflow(&self) -> bool {
        matches!(self, Self::Recovered)
    }
}

impl fmt::Display for CategoryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expense => write!(f, "Expense"),
            Self::Savings => write!(f, "Savings"),
            Self::Recovered => write!(f, "Recovered"),
            Self::Lost => write!(f, "Lost"),
        }
    }
}

/// A category line inside a monthly budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCategory {
    /// Category name, unique within its budget
    pub name: String,

    /// Amount planned for this category
    pub planned_amount: Money,

    #[serde(default)]
    pub notes: String,

    /// Missing in older documents; those default to expense
    #[serde(default)]
    pub tag: CategoryTag,
}

impl BudgetCategory {
    /// Create a category, inferring its tag from the name
    pub fn new(name: impl Into<String>, planned_amount: Money) -> Self {
        let name = name.into();
        let tag = CategoryTag::infer(&name);
        Self {
            name,
            planned_amount,
            notes: String::new(),
            tag,
        }
    }

    /// Create a category with an explicit tag
    pub fn tagged(name: impl Into<String>, planned_amount: Money, tag: CategoryTag) -> Self {
        Self {
            name: name.into(),
            planned_amount,
            notes: String::new(),
            tag,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        if self.name.trim().is_empty() {
            return Err(CategoryValidationError::EmptyName);
        }
        if self.planned_amount.is_negative() {
            return Err(CategoryValidationError::NegativePlanned(self.name.clone()));
        }
        Ok(())
    }
}

/// Validation errors for categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryValidationError {
    EmptyName,
    NegativePlanned(String),
    DuplicateName(String),
}

impl fmt::Display for CategoryValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Category name cannot be empty"),
            Self::NegativePlanned(name) => {
                write!(f, "Planned amount for '{}' cannot be negative", name)
            }
            Self::DuplicateName(name) => write!(f, "Duplicate category name: '{}'", name),
        }
    }
}

impl std::error::Error for CategoryValidationError {}
