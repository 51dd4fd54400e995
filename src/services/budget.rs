//! Budget service
//!
//! Budgets are created by explicit save only, one per user per month.
//! After creation only the `closed` flag changes, and only from open to
//! closed. Closing has no effect on ledgers; it only blocks new
//! transactions.

use tracing::info;

use crate::error::{HazinaError, HazinaResult};
use crate::models::{Budget, BudgetCategory, BudgetMonth, Money, UserId};
use crate::storage::Storage;

/// Service for monthly budgets
pub struct BudgetService<'a> {
    storage: &'a Storage,
}

impl<'a> BudgetService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Save a new budget for `month`
    ///
    /// Categories built with [`BudgetCategory::new`] carry an inferred tag;
    /// use [`BudgetCategory::tagged`] to set one explicitly. Saving a month
    /// that already has a budget fails with `Duplicate`.
    pub fn create_budget(
        &self,
        user: &UserId,
        month: BudgetMonth,
        categories: Vec<BudgetCategory>,
        total_debited: Money,
    ) -> HazinaResult<Budget> {
        let budget = Budget::new(month, categories, total_debited);
        budget
            .validate()
            .map_err(|e| HazinaError::Validation(e.to_string()))?;

        self.storage.budgets.insert(user, budget.clone())?;
        self.storage.log_create(user, &budget);

        info!(
            user = %user,
            month = %month,
            planned = %budget.total_planned,
            debited = %budget.total_debited,
            "Created budget"
        );
        Ok(budget)
    }

    pub fn get(&self, user: &UserId, month: BudgetMonth) -> HazinaResult<Option<Budget>> {
        self.storage.budgets.get(user, &month)
    }

    /// Get a budget, failing with `NotFound` when the month has none
    pub fn require(&self, user: &UserId, month: BudgetMonth) -> HazinaResult<Budget> {
        self.get(user, month)?
            .ok_or_else(|| HazinaError::budget_not_found(month.to_string()))
    }

    /// All budgets, oldest month first
    pub fn list(&self, user: &UserId) -> HazinaResult<Vec<Budget>> {
        let mut budgets = self.storage.budgets.list(user)?;
        budgets.sort_by_key(|b| b.month);
        Ok(budgets)
    }

    /// Close a budget; closing an already closed budget is a no-op
    pub fn close_budget(&self, user: &UserId, month: BudgetMonth) -> HazinaResult<Budget> {
        let before = self.require(user, month)?;
        if before.closed {
            return Ok(before);
        }

        let mut after = before.clone();
        after.close();
        self.storage.budgets.update(user, after.clone())?;
        self.storage.log_update(user, &before, &after);

        info!(user = %user, month = %month, "Closed budget");
        Ok(after)
    }
}
