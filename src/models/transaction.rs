//! Transaction model
//!
//! Transactions are booked against a category of a monthly budget. Amounts
//! are always positive; whether money flows in or out is decided by the
//! category. Once created a transaction only changes through the
//! `adjusted` marker set by correction migrations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::TransactionId;
use super::money::Money;
use super::period::BudgetMonth;

/// How a transaction was paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "MPESA")]
    Mpesa,
    #[serde(rename = "Cash")]
    Cash,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [Self::Mpesa, Self::Cash, Self::BankTransfer];
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mpesa => write!(f, "MPESA"),
            Self::Cash => write!(f, "Cash"),
            Self::BankTransfer => write!(f, "Bank Transfer"),
        }
    }
}

/// Who created a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionOrigin {
    #[default]
    User,
    Migration,
}

/// A recorded transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// Name of a category in the referenced budget (not enforced by the store)
    pub category: String,

    /// Always positive
    pub amount: Money,

    pub budget_month: BudgetMonth,

    pub date_of_transaction: NaiveDate,

    #[serde(default)]
    pub paid_through: PaymentMethod,

    #[serde(default)]
    pub note: String,

    pub created_at: DateTime<Utc>,

    /// Set only by the chama correction migration
    #[serde(default)]
    pub adjusted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment_note: Option<String>,

    /// Back-reference for correction transactions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_transaction_id: Option<TransactionId>,

    #[serde(default)]
    pub origin: TransactionOrigin,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(
        category: impl Into<String>,
        amount: Money,
        budget_month: BudgetMonth,
        date_of_transaction: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            category: category.into(),
            amount,
            budget_month,
            date_of_transaction,
            paid_through: PaymentMethod::default(),
            note: String::new(),
            created_at: Utc::now(),
            adjusted: false,
            adjustment_note: None,
            related_transaction_id: None,
            origin: TransactionOrigin::User,
        }
    }

    pub fn with_payment(mut self, paid_through: PaymentMethod) -> Self {
        self.paid_through = paid_through;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Check if this transaction is booked to `category`
    pub fn is_in(&self, category: &str) -> bool {
        self.category == category
    }

    /// Mark as adjusted by a correction migration
    pub fn mark_adjusted(&mut self, note: impl Into<String>) {
        self.adjusted = true;
        self.adjustment_note = Some(note.into());
    }

    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if self.category.trim().is_empty() {
            return Err(TransactionValidationError::MissingCategory);
        }
        if !self.amount.is_positive() {
            return Err(TransactionValidationError::NonPositiveAmount(self.amount));
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({})",
            self.date_of_transaction.format("%Y-%m-%d"),
            self.category,
            self.amount,
            self.paid_through
        )
    }
}

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    MissingCategory,
    NonPositiveAmount(Money),
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCategory => write!(f, "Transaction must have a category"),
            Self::NonPositiveAmount(amount) => {
                write!(f, "Transaction amount must be positive, got {}", amount)
            }
        }
    }
}

impl std::error::Error for TransactionValidationError {}
