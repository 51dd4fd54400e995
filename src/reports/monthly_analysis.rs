//! Monthly Analysis Report
//!
//! Compares a month's budget with the transactions booked against it.
//! How a category's money counts comes from its [`CategoryTag`]: recovered
//! money is an inflow that reduces net outflow, lost money is shown as a
//! deficit, and savings are split out of spending for the progress bar.

use std::collections::HashMap;
use std::io::Write;

use crate::config::Settings;
use crate::error::HazinaResult;
use crate::models::{Budget, BudgetMonth, CategoryTag, Money, Transaction, UserId};
use crate::services::{BudgetService, TransactionService};
use crate::storage::Storage;

/// Analysis of one budget category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAnalysisRow {
    pub name: String,
    pub tag: CategoryTag,
    pub planned: Money,
    /// Sum of transactions booked to this category
    pub actual: Money,
    /// Planned minus actual; planned plus actual for recovered money;
    /// minus actual for lost money
    pub balance: Money,
    pub transaction_count: usize,
}

impl CategoryAnalysisRow {
    fn new(name: &str, tag: CategoryTag, planned: Money, actual: Money, count: usize) -> Self {
        let balance = match tag {
            CategoryTag::Recovered => planned + actual,
            CategoryTag::Lost => -actual,
            CategoryTag::Expense | CategoryTag::Savings => planned - actual,
        };
        Self {
            name: name.to_string(),
            tag,
            planned,
            actual,
            balance,
            transaction_count: count,
        }
    }

    pub fn is_deficit(&self) -> bool {
        self.balance.is_negative()
    }
}

/// Shares of the planned total for a three-part progress bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressBreakdown {
    pub spent_pct: f64,
    pub saved_pct: f64,
    pub remaining_pct: f64,
}

impl ProgressBreakdown {
    fn new(total_planned: Money, spent: Money, saved: Money, remaining: Money) -> Self {
        let denom = if total_planned.is_positive() {
            total_planned.cents() as f64
        } else {
            Money::from_units(1).cents() as f64
        };
        let pct = |amount: Money| (amount.cents() as f64 * 100.0 / denom).clamp(0.0, 100.0);
        Self {
            spent_pct: pct(spent),
            saved_pct: pct(saved),
            remaining_pct: pct(remaining),
        }
    }
}

/// Monthly Analysis Report
#[derive(Debug, Clone)]
pub struct MonthlyAnalysisReport {
    pub month: BudgetMonth,
    pub total_planned: Money,
    pub total_debited: Money,
    /// Outflows minus recovered inflows
    pub net_outflow: Money,
    /// Planned total minus net outflow, floored at zero
    pub remaining_budget: Money,
    /// Debited total minus net outflow; negative when overspent
    pub balance_from_total_debited: Money,
    pub amount_lost: Money,
    pub amount_recovered: Money,
    pub saved_so_far: Money,
    pub to_be_saved: Money,
    pub spent_excluding_savings: Money,
    pub progress: ProgressBreakdown,
    pub categories: Vec<CategoryAnalysisRow>,
    /// Symbol used by [`Self::format_terminal`]
    pub currency: String,
}

/// Tag of a transaction's category, from settings when the budget has no such line
fn tag_for(tags: &HashMap<&str, CategoryTag>, settings: &Settings, category: &str) -> CategoryTag {
    tags.get(category)
        .copied()
        .unwrap_or_else(|| settings.tag_for_category(category))
}

impl MonthlyAnalysisReport {
    /// Generate the analysis for `month`
    pub fn generate(storage: &Storage, user: &UserId, month: BudgetMonth) -> HazinaResult<Self> {
        let budget = BudgetService::new(storage).require(user, month)?;
        let transactions = TransactionService::new(storage).list_for_month(user, month)?;
        Ok(Self::from_parts(&budget, &transactions, storage.settings()))
    }

    /// Build the analysis from a budget and that month's transactions
    pub fn from_parts(budget: &Budget, transactions: &[Transaction], settings: &Settings) -> Self {
        let tags: HashMap<&str, CategoryTag> = budget
            .categories
            .iter()
            .map(|c| (c.name.as_str(), c.tag))
            .collect();

        let mut totals_by_tag: HashMap<CategoryTag, Money> = HashMap::new();
        let mut by_category: HashMap<&str, (Money, usize)> = HashMap::new();
        for txn in transactions {
            *totals_by_tag
                .entry(tag_for(&tags, settings, &txn.category))
                .or_default() += txn.amount;
            let entry = by_category.entry(txn.category.as_str()).or_default();
            entry.0 += txn.amount;
            entry.1 += 1;
        }
        let total = |tag: CategoryTag| totals_by_tag.get(&tag).copied().unwrap_or_default();

        let amount_recovered: Money = totals_by_tag
            .iter()
            .filter(|(tag, _)| tag.is_inflow())
            .map(|(_, amount)| *amount)
            .sum();
        let amount_lost = total(CategoryTag::Lost);
        let saved_so_far = total(CategoryTag::Savings);
        let outflows = transactions.iter().map(|t| t.amount).sum::<Money>() - amount_recovered;
        let net_outflow = outflows - amount_recovered;

        let remaining_budget = (budget.total_planned - net_outflow).max_zero();
        let to_be_saved = (budget.planned_for_tag(CategoryTag::Savings) - saved_so_far).max_zero();
        let spent_excluding_savings = (net_outflow - saved_so_far).max_zero();

        let categories = budget
            .categories
            .iter()
            .map(|c| {
                let (actual, count) = by_category
                    .get(c.name.as_str())
                    .copied()
                    .unwrap_or_default();
                CategoryAnalysisRow::new(&c.name, c.tag, c.planned_amount, actual, count)
            })
            .collect();

        Self {
            month: budget.month,
            total_planned: budget.total_planned,
            total_debited: budget.total_debited,
            net_outflow,
            remaining_budget,
            balance_from_total_debited: budget.total_debited - net_outflow,
            amount_lost,
            amount_recovered,
            saved_so_far,
            to_be_saved,
            spent_excluding_savings,
            progress: ProgressBreakdown::new(
                budget.total_planned,
                spent_excluding_savings,
                saved_so_far,
                remaining_budget,
            ),
            categories,
            currency: settings.currency_symbol.clone(),
        }
    }

    fn money(&self, amount: Money) -> String {
        amount.format_with_symbol(&self.currency)
    }

    pub fn deficit_categories(&self) -> Vec<&CategoryAnalysisRow> {
        self.categories.iter().filter(|c| c.is_deficit()).collect()
    }

    /// Format the report for terminal display
    pub fn format_terminal(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Monthly Analysis - {}\n", self.month));
        output.push_str(&"=".repeat(72));
        output.push('\n');
        output.push_str(&format!("Total Debited:      {:>16}\n", self.money(self.total_debited)));
        output.push_str(&format!("Total Planned:      {:>16}\n", self.money(self.total_planned)));
        output.push_str(&format!("Net Outflow:        {:>16}\n", self.money(self.net_outflow)));
        output.push_str(&format!("Remaining Budget:   {:>16}\n", self.money(self.remaining_budget)));
        output.push_str(&format!(
            "Balance (Debited):  {:>16}\n",
            self.money(self.balance_from_total_debited)
        ));
        output.push_str(&format!("Saved So Far:       {:>16}\n", self.money(self.saved_so_far)));
        output.push_str(&format!("To Be Saved:        {:>16}\n", self.money(self.to_be_saved)));
        output.push_str(&format!("Amount Lost:        {:>16}\n", self.money(self.amount_lost)));
        output.push_str(&format!("Amount Recovered:   {:>16}\n", self.money(self.amount_recovered)));
        output.push_str(&format!(
            "Progress: spent {:.0}% | saved {:.0}% | remaining {:.0}%\n\n",
            self.progress.spent_pct, self.progress.saved_pct, self.progress.remaining_pct
        ));

        output.push_str(&format!(
            "{:<28} {:>14} {:>14} {:>14}\n",
            "Category", "Planned", "Actual", "Balance"
        ));
        output.push_str(&"-".repeat(72));
        output.push('\n');

        for row in &self.categories {
            let balance = if row.is_deficit() {
                format!("{} *", self.money(row.balance))
            } else {
                self.money(row.balance)
            };
            output.push_str(&format!(
                "{:<28} {:>14} {:>14} {:>14}\n",
                row.name,
                self.money(row.planned),
                self.money(row.actual),
                balance
            ));
        }

        output.push_str("\n* = Deficit\n");
        output
    }

    /// Export the category rows to CSV format
    pub fn export_csv<W: Write>(&self, writer: &mut W) -> HazinaResult<()> {
        writeln!(writer, "Month,Category,Tag,Planned,Actual,Balance,Transactions")?;

        for row in &self.categories {
            writeln!(
                writer,
                "{},{},{},{:.2},{:.2},{:.2},{}",
                self.month,
                escape_csv_field(&row.name),
                row.tag,
                row.planned.cents() as f64 / 100.0,
                row.actual.cents() as f64 / 100.0,
                row.balance.cents() as f64 / 100.0,
                row.transaction_count
            )?;
        }

        Ok(())
    }
}

fn escape_csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
