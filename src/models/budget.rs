//! Monthly budget model
//!
//! One budget document exists per user per month. Its categories and the
//! debited total are fixed at creation; only the `closed` flag changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::category::{BudgetCategory, CategoryTag, CategoryValidationError};
use super::money::Money;
use super::period::BudgetMonth;

/// A monthly budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// The month this budget covers; also the document key
    pub month: BudgetMonth,

    /// Ordered category lines
    pub categories: Vec<BudgetCategory>,

    /// Sum of planned amounts at save time (never recomputed)
    pub total_planned: Money,

    /// Amount actually debited from the funding account that month
    pub total_debited: Money,

    /// One-way flag; closed budgets accept no new transactions
    #[serde(default)]
    pub closed: bool,

    pub created_at: DateTime<Utc>,
}

impl Budget {
    /// Create a new open budget, denormalizing the planned total
    pub fn new(month: BudgetMonth, categories: Vec<BudgetCategory>, total_debited: Money) -> Self {
        let total_planned = categories.iter().map(|c| c.planned_amount).sum();
        Self {
            month,
            categories,
            total_planned,
            total_debited,
            closed: false,
            created_at: Utc::now(),
        }
    }

    /// Find a category by exact name
    pub fn category(&self, name: &str) -> Option<&BudgetCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.category(name).is_some()
    }

    /// Planned amount for all categories carrying `tag`
    pub fn planned_for_tag(&self, tag: CategoryTag) -> Money {
        self.categories
            .iter()
            .filter(|c| c.tag == tag)
            .map(|c| c.planned_amount)
            .sum()
    }

    /// Funding received minus the amount allocated to categories
    ///
    /// Negative when the month was under-funded.
    pub fn surplus(&self) -> Money {
        self.total_debited - self.total_planned
    }

    /// Close the budget; closing is one-way
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn validate(&self) -> Result<(), BudgetValidationError> {
        if self.total_debited.is_negative() {
            return Err(BudgetValidationError::NegativeDebited);
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            category.validate().map_err(BudgetValidationError::Category)?;
            if !seen.insert(category.name.as_str()) {
                return Err(BudgetValidationError::Category(
                    CategoryValidationError::DuplicateName(category.name.clone()),
                ));
            }
        }

        Ok(())
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} planned: {} debited: {}{}",
            self.month,
            self.total_planned,
            self.total_debited,
            if self.closed { " (closed)" } else { "" }
        )
    }
}

/// Validation errors for budgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetValidationError {
    NegativeDebited,
    Category(CategoryValidationError),
}

impl fmt::Display for BudgetValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeDebited => write!(f, "Total debited cannot be negative"),
            Self::Category(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BudgetValidationError {}
