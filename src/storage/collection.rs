//! Document collection interface
//!
//! A collection stores one kind of document per user and offers exactly four
//! operations: `get`, `list`, `insert` and `update`. There is no delete and
//! no multi-document transaction.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;

use crate::audit::EntityType;
use crate::error::HazinaResult;
use crate::models::{
    Budget, BudgetMonth, Chama, ChamaEntry, ChamaId, EntryId, LedgerEntry, SavingsEntry,
    Transaction, TransactionId, UnallocatedEntry, UserId,
};

/// A record that can live in a [`Collection`]
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + Send + Sync;

    /// Entity name used in errors and audit records
    const ENTITY: EntityType;

    fn doc_id(&self) -> Self::Id;

    /// Short label for the audit log
    fn audit_label(&self) -> Option<String> {
        None
    }
}

/// Per-user document collection
///
/// `insert` fails with `Duplicate` when the id is already present and
/// `update` fails with `NotFound` when it is not. `list` returns documents
/// in insertion order.
pub trait Collection<T: Document>: Send + Sync {
    fn get(&self, user: &UserId, id: &T::Id) -> HazinaResult<Option<T>>;

    fn list(&self, user: &UserId) -> HazinaResult<Vec<T>>;

    fn insert(&self, user: &UserId, doc: T) -> HazinaResult<()>;

    fn update(&self, user: &UserId, doc: T) -> HazinaResult<()>;
}

impl Document for Budget {
    type Id = BudgetMonth;
    const ENTITY: EntityType = EntityType::Budget;

    fn doc_id(&self) -> BudgetMonth {
        self.month
    }

    fn audit_label(&self) -> Option<String> {
        Some(self.month.to_string())
    }
}

impl Document for Transaction {
    type Id = TransactionId;
    const ENTITY: EntityType = EntityType::Transaction;

    fn doc_id(&self) -> TransactionId {
        self.id
    }

    fn audit_label(&self) -> Option<String> {
        Some(format!("{} {}", self.category, self.amount))
    }
}

impl Document for Chama {
    type Id = ChamaId;
    const ENTITY: EntityType = EntityType::Chama;

    fn doc_id(&self) -> ChamaId {
        self.id
    }

    fn audit_label(&self) -> Option<String> {
        Some(self.name.clone())
    }
}

macro_rules! ledger_document {
    ($entry:ty) => {
        impl Document for $entry {
            type Id = EntryId;
            const ENTITY: EntityType = EntityType::for_ledger(<$entry as LedgerEntry>::KIND);

            fn doc_id(&self) -> EntryId {
                self.meta.id
            }

            fn audit_label(&self) -> Option<String> {
                (!self.meta.note.is_empty()).then(|| self.meta.note.clone())
            }
        }
    };
}

ledger_document!(SavingsEntry);
ledger_document!(ChamaEntry);
ledger_document!(UnallocatedEntry);
