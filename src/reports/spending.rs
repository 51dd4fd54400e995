//! Spending Report
//!
//! Chart data over all of a user's transactions: the most used categories by
//! amount and by frequency, how transactions were paid, and daily spend over
//! a trailing window.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};

use crate::error::HazinaResult;
use crate::models::money::DEFAULT_CURRENCY;
use crate::models::{Money, PaymentMethod, Transaction, UserId};
use crate::storage::Storage;

/// A category with its total amount and number of transactions
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub name: String,
    pub total: Money,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentMethodCount {
    pub method: PaymentMethod,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySpend {
    pub date: NaiveDate,
    pub amount: Money,
}

/// Spending Report
#[derive(Debug, Clone)]
pub struct SpendingReport {
    /// Largest totals first
    pub top_by_amount: Vec<CategoryTotal>,
    /// Most transactions first
    pub top_by_frequency: Vec<CategoryTotal>,
    /// One count per payment method, in [`PaymentMethod::ALL`] order
    pub payment_methods: Vec<PaymentMethodCount>,
    /// Oldest day first; days without transactions are omitted
    pub daily_spend: Vec<DailySpend>,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// Symbol used by [`Self::format_terminal`]
    pub currency: String,
}

impl SpendingReport {
    /// Generate the report with the daily window ending on `as_of`
    ///
    /// The window length and top-N limit come from settings.
    pub fn generate(storage: &Storage, user: &UserId, as_of: NaiveDate) -> HazinaResult<Self> {
        let settings = storage.settings();
        let transactions = storage.transactions.list(user)?;
        Ok(Self::from_transactions(
            &transactions,
            as_of,
            settings.daily_spend_window_days,
            settings.top_category_limit,
        )
        .with_currency(&settings.currency_symbol))
    }

    pub fn from_transactions(
        transactions: &[Transaction],
        as_of: NaiveDate,
        window_days: u32,
        limit: usize,
    ) -> Self {
        let mut by_category: HashMap<&str, (Money, usize)> = HashMap::new();
        for txn in transactions {
            let name = txn.category.trim();
            if name.is_empty() {
                continue;
            }
            let entry = by_category.entry(name).or_default();
            entry.0 += txn.amount;
            entry.1 += 1;
        }
        let totals: Vec<CategoryTotal> = by_category
            .into_iter()
            .map(|(name, (total, count))| CategoryTotal {
                name: name.to_string(),
                total,
                count,
            })
            .collect();

        let mut top_by_amount = totals.clone();
        top_by_amount.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        top_by_amount.truncate(limit);

        let mut top_by_frequency = totals;
        top_by_frequency.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        top_by_frequency.truncate(limit);

        let payment_methods = PaymentMethod::ALL
            .iter()
            .map(|&method| PaymentMethodCount {
                method,
                count: transactions.iter().filter(|t| t.paid_through == method).count(),
            })
            .collect();

        let window_start = as_of - Duration::days(i64::from(window_days));
        let mut daily: BTreeMap<NaiveDate, Money> = BTreeMap::new();
        for txn in transactions
            .iter()
            .filter(|t| (window_start..=as_of).contains(&t.date_of_transaction))
        {
            *daily.entry(txn.date_of_transaction).or_default() += txn.amount;
        }
        let daily_spend = daily
            .into_iter()
            .map(|(date, amount)| DailySpend { date, amount })
            .collect();

        Self {
            top_by_amount,
            top_by_frequency,
            payment_methods,
            daily_spend,
            window_start,
            window_end: as_of,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn with_currency(mut self, symbol: &str) -> Self {
        self.currency = symbol.to_string();
        self
    }

    /// Total spent inside the daily window
    pub fn window_total(&self) -> Money {
        self.daily_spend.iter().map(|d| d.amount).sum()
    }

    /// Format the report for terminal display
    pub fn format_terminal(&self) -> String {
        let mut output = String::new();

        output.push_str("Top Categories by Amount\n");
        output.push_str(&"-".repeat(50));
        output.push('\n');
        for category in &self.top_by_amount {
            output.push_str(&format!(
                "{:<30} {:>18}\n",
                category.name,
                category.total.format_with_symbol(&self.currency)
            ));
        }

        output.push_str("\nTop Categories by Frequency\n");
        output.push_str(&"-".repeat(50));
        output.push('\n');
        for category in &self.top_by_frequency {
            output.push_str(&format!("{:<30} {:>18}\n", category.name, category.count));
        }

        output.push_str("\nPayment Methods\n");
        output.push_str(&"-".repeat(50));
        output.push('\n');
        for method in &self.payment_methods {
            output.push_str(&format!(
                "{:<30} {:>18}\n",
                method.method.to_string(),
                method.count
            ));
        }

        output.push_str(&format!(
            "\nDaily Spend {} to {}\n",
            self.window_start, self.window_end
        ));
        output.push_str(&"-".repeat(50));
        output.push('\n');
        for day in &self.daily_spend {
            output.push_str(&format!(
                "{:<30} {:>18}\n",
                day.date.format("%Y-%m-%d").to_string(),
                day.amount.format_with_symbol(&self.currency)
            ));
        }
        output.push_str(&format!(
            "{:<30} {:>18}\n",
            "Total",
            self.window_total().format_with_symbol(&self.currency)
        ));

        output
    }
}
