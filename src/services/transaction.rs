//! Transaction service
//!
//! Records transactions against an open budget. Creating a transaction in
//! the configured savings category also appends a savings deposit. The
//! deposit is best-effort: if it fails the transaction stays recorded and
//! the savings backfill picks it up later.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{HazinaError, HazinaResult};
use crate::models::transaction::TransactionValidationError;
use crate::models::{
    BudgetMonth, EntryId, EntryMeta, EntrySource, SavingsEntry, Transaction, TransactionId,
    TransactionOrigin, UserId,
};
use crate::services::budget::BudgetService;
use crate::storage::Storage;

/// Namespace of savings deposits derived from transactions
pub(crate) const SAVINGS_DEPOSIT_NAMESPACE: &str = "savings-ledger";

/// Id of the savings deposit belonging to a savings transaction
///
/// Shared by the creation hook and the savings backfill so the deposit can
/// only ever be written once.
pub fn savings_deposit_id(transaction_id: TransactionId) -> EntryId {
    EntryId::derived(SAVINGS_DEPOSIT_NAMESPACE, transaction_id.as_uuid())
}

/// A newly recorded transaction and the outcome of its savings hook
#[derive(Debug, Clone)]
pub struct CreatedTransaction {
    pub transaction: Transaction,
    /// Deposit appended because the category is the savings category
    pub savings_deposit: Option<SavingsEntry>,
    /// Set when the deposit should have been written but wasn't
    pub savings_deposit_error: Option<String>,
}

fn validation_error(e: TransactionValidationError) -> HazinaError {
    match e {
        TransactionValidationError::NonPositiveAmount(_) => HazinaError::InvalidAmount(e.to_string()),
        TransactionValidationError::MissingCategory => HazinaError::Validation(e.to_string()),
    }
}

/// Service for transaction management
pub struct TransactionService<'a> {
    storage: &'a Storage,
}

impl<'a> TransactionService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Record a transaction and run the savings hook
    ///
    /// The budget for the transaction's month must exist and be open, and
    /// the category must be one of its lines.
    pub fn create(&self, user: &UserId, mut txn: Transaction) -> HazinaResult<CreatedTransaction> {
        txn.validate().map_err(validation_error)?;
        txn.origin = TransactionOrigin::User;

        let budget = BudgetService::new(self.storage).require(user, txn.budget_month)?;
        if budget.closed {
            return Err(HazinaError::ClosedBudget(budget.month.to_string()));
        }
        if !budget.has_category(&txn.category) {
            return Err(HazinaError::Validation(format!(
                "Category '{}' is not in the {} budget",
                txn.category, budget.month
            )));
        }

        self.storage.transactions.insert(user, txn.clone())?;
        self.storage.log_create(user, &txn);
        info!(
            user = %user,
            transaction = %txn.id,
            category = %txn.category,
            amount = %txn.amount,
            "Created transaction"
        );

        let (savings_deposit, savings_deposit_error) = match self.record_savings_deposit(user, &txn) {
            Ok(deposit) => (deposit, None),
            Err(e) => {
                warn!(
                    user = %user,
                    transaction = %txn.id,
                    error = %e,
                    "Savings deposit failed; backfill will repair it"
                );
                (None, Some(e.to_string()))
            }
        };

        Ok(CreatedTransaction {
            transaction: txn,
            savings_deposit,
            savings_deposit_error,
        })
    }

    /// Append the savings deposit for a savings transaction
    ///
    /// Returns `None` for any other category.
    fn record_savings_deposit(
        &self,
        user: &UserId,
        txn: &Transaction,
    ) -> HazinaResult<Option<SavingsEntry>> {
        if !txn.is_in(&self.storage.settings().savings_category) {
            return Ok(None);
        }

        let meta = EntryMeta::new(txn.amount, EntrySource::Transaction)
            .with_id(savings_deposit_id(txn.id))
            .at(Utc::now())
            .related_to(txn.id)
            .for_month(txn.budget_month)
            .with_note(txn.note.clone());
        let entry = self
            .storage
            .append(&self.storage.savings, user, SavingsEntry::deposit(meta))?;
        Ok(Some(entry))
    }

    /// Record a transaction written by a migration
    ///
    /// Only the target budget's existence is checked; the category does not
    /// have to be a line of that budget and no savings hook runs.
    pub(crate) fn create_from_migration(
        &self,
        user: &UserId,
        mut txn: Transaction,
    ) -> HazinaResult<Transaction> {
        txn.validate().map_err(validation_error)?;
        txn.origin = TransactionOrigin::Migration;
        BudgetService::new(self.storage).require(user, txn.budget_month)?;

        self.storage.transactions.insert(user, txn.clone())?;
        self.storage.log_create(user, &txn);
        Ok(txn)
    }

    /// Flag a transaction as adjusted by a correction migration
    pub(crate) fn mark_adjusted(
        &self,
        user: &UserId,
        id: TransactionId,
        note: &str,
    ) -> HazinaResult<Transaction> {
        let before = self.require(user, id)?;
        let mut after = before.clone();
        after.mark_adjusted(note);

        self.storage.transactions.update(user, after.clone())?;
        self.storage.log_update(user, &before, &after);
        Ok(after)
    }

    pub fn get(&self, user: &UserId, id: TransactionId) -> HazinaResult<Option<Transaction>> {
        self.storage.transactions.get(user, &id)
    }

    pub fn require(&self, user: &UserId, id: TransactionId) -> HazinaResult<Transaction> {
        self.get(user, id)?
            .ok_or_else(|| HazinaError::transaction_not_found(id.to_string()))
    }

    /// All transactions, newest first
    pub fn list(&self, user: &UserId) -> HazinaResult<Vec<Transaction>> {
        let mut transactions = self.storage.transactions.list(user)?;
        transactions.sort_by(|a, b| {
            b.date_of_transaction
                .cmp(&a.date_of_transaction)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(transactions)
    }

    /// Transactions booked to one budget month, newest first
    pub fn list_for_month(&self, user: &UserId, month: BudgetMonth) -> HazinaResult<Vec<Transaction>> {
        Ok(self
            .list(user)?
            .into_iter()
            .filter(|t| t.budget_month == month)
            .collect())
    }
}
