//! Core data models for hazina
//!
//! This module contains the data structures of the budgeting domain:
//! monthly budgets, transactions, chamas and the three ledger entry types.

pub mod budget;
pub mod category;
pub mod chama;
pub mod ids;
pub mod ledger;
pub mod money;
pub mod period;
pub mod transaction;

pub use budget::Budget;
pub use category::{BudgetCategory, CategoryTag};
pub use chama::{Chama, ChamaStatus};
pub use ids::{ChamaId, EntryId, TransactionId, TransferId, UserId};
pub use ledger::{
    AnyEntry, ChamaEntry, ChamaEntryType, Direction, EntryMeta, EntrySource, LedgerAddress,
    LedgerEntry, LedgerKind, Partition, SavingsEntry, SavingsEntryType, UnallocatedEntry,
    UnallocatedEntryType,
};
pub use money::Money;
pub use period::BudgetMonth;
pub use transaction::{PaymentMethod, Transaction, TransactionOrigin};
