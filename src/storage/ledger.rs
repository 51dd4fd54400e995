//! Append-only ledger repository
//!
//! Wraps a collection of ledger entries and exposes only `append` and
//! `list`. Historical entries are never updated or deleted; corrections are
//! made by appending reversing entries.

use std::sync::Arc;

use crate::error::{HazinaError, HazinaResult};
use crate::models::{EntryId, LedgerEntry, UserId};

use super::collection::{Collection, Document};

/// Repository for one ledger kind
pub struct LedgerRepository<E>
where
    E: LedgerEntry + Document<Id = EntryId>,
{
    collection: Arc<dyn Collection<E>>,
}

impl<E> LedgerRepository<E>
where
    E: LedgerEntry + Document<Id = EntryId>,
{
    pub fn new(collection: Arc<dyn Collection<E>>) -> Self {
        Self { collection }
    }

    /// Append an entry
    ///
    /// Amounts must be positive; the entry type carries the direction. An
    /// entry whose id is already present is rejected with `Duplicate`, which
    /// is what makes derived ids idempotent.
    pub fn append(&self, user: &UserId, entry: E) -> HazinaResult<E> {
        if !entry.amount().is_positive() {
            return Err(HazinaError::InvalidAmount(format!(
                "Ledger entry amount must be positive, got {}",
                entry.amount()
            )));
        }
        self.collection.insert(user, entry.clone())?;
        Ok(entry)
    }

    /// All entries for the user in append order
    pub fn list(&self, user: &UserId) -> HazinaResult<Vec<E>> {
        self.collection.list(user)
    }

    pub fn get(&self, user: &UserId, id: EntryId) -> HazinaResult<Option<E>> {
        self.collection.get(user, &id)
    }

    pub fn contains(&self, user: &UserId, id: EntryId) -> HazinaResult<bool> {
        Ok(self.get(user, id)?.is_some())
    }
}
