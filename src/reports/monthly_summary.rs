//! Monthly Summary Report
//!
//! One row per budget month: what was debited, what was planned and what
//! was spent net of recovered money.

use crate::error::HazinaResult;
use crate::models::{BudgetMonth, Money, UserId};
use crate::services::{BudgetService, TransactionService};
use crate::storage::Storage;

use super::monthly_analysis::MonthlyAnalysisReport;

#[derive(Debug, Clone, PartialEq)]
pub struct MonthSummaryRow {
    pub month: BudgetMonth,
    pub total_debited: Money,
    pub total_planned: Money,
    pub net_outflow: Money,
    /// Planned minus net outflow; negative when overspent
    pub balance: Money,
    pub closed: bool,
}

impl MonthSummaryRow {
    pub fn is_overspent(&self) -> bool {
        self.balance.is_negative()
    }
}

/// Monthly Summary Report
#[derive(Debug, Clone)]
pub struct MonthlySummaryReport {
    /// Newest month first
    pub rows: Vec<MonthSummaryRow>,
    pub currency: String,
}

impl MonthlySummaryReport {
    pub fn generate(storage: &Storage, user: &UserId) -> HazinaResult<Self> {
        let transactions = TransactionService::new(storage);
        let settings = storage.settings();

        let mut rows = Vec::new();
        for budget in BudgetService::new(storage).list(user)?.into_iter().rev() {
            let month_txns = transactions.list_for_month(user, budget.month)?;
            let analysis = MonthlyAnalysisReport::from_parts(&budget, &month_txns, settings);
            rows.push(MonthSummaryRow {
                month: budget.month,
                total_debited: budget.total_debited,
                total_planned: budget.total_planned,
                net_outflow: analysis.net_outflow,
                balance: budget.total_planned - analysis.net_outflow,
                closed: budget.closed,
            });
        }

        Ok(Self {
            rows,
            currency: settings.currency_symbol.clone(),
        })
    }

    /// Format the report for terminal display
    pub fn format_terminal(&self) -> String {
        let mut output = String::new();

        output.push_str("Monthly Summary\n");
        output.push_str(&"=".repeat(76));
        output.push('\n');

        if self.rows.is_empty() {
            output.push_str("No budgets found yet.\n");
            return output;
        }

        output.push_str(&format!(
            "{:<10} {:>16} {:>16} {:>16} {:>16}\n",
            "Month", "Debited", "Budgeted", "Spent", "Balance"
        ));
        output.push_str(&"-".repeat(76));
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!(
                "{:<10} {:>16} {:>16} {:>16} {:>16}{}\n",
                row.month.to_string(),
                row.total_debited.format_with_symbol(&self.currency),
                row.total_planned.format_with_symbol(&self.currency),
                row.net_outflow.format_with_symbol(&self.currency),
                row.balance.format_with_symbol(&self.currency),
                if row.closed { " (closed)" } else { "" }
            ));
        }

        output
    }
}
