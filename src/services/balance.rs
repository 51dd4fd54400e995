//! Balance engine
//!
//! Balances are never stored. They are folded on demand from ledger
//! entries: increases (deposit, contribution) add, decreases (withdrawal,
//! payout) subtract. The fold is order-independent and never clamps; a
//! negative result is returned as-is for callers to surface.

use std::collections::BTreeMap;

use crate::error::HazinaResult;
use crate::models::{AnyEntry, LedgerAddress, LedgerKind, Money, Partition, UserId};
use crate::storage::Storage;

/// Net balance of all entries
pub fn fold_balance<'a>(entries: impl IntoIterator<Item = &'a AnyEntry>) -> Money {
    entries.into_iter().map(AnyEntry::signed_amount).sum()
}

/// Net balance of the entries in one partition
pub fn balance_for<'a>(
    entries: impl IntoIterator<Item = &'a AnyEntry>,
    partition: Partition,
) -> Money {
    fold_balance(entries.into_iter().filter(|e| e.partition() == partition))
}

/// Balance per partition, ordered with the pool first
pub fn partition_balances<'a>(
    entries: impl IntoIterator<Item = &'a AnyEntry>,
) -> BTreeMap<Partition, Money> {
    let mut balances = BTreeMap::new();
    for entry in entries {
        *balances.entry(entry.partition()).or_insert_with(Money::zero) += entry.signed_amount();
    }
    balances
}

/// Result of checking that partition balances add up to the ledger total
#[derive(Debug, Clone, PartialEq)]
pub struct ConservationReport {
    pub kind: LedgerKind,
    /// Sum of increases minus sum of decreases across the whole ledger
    pub total: Money,
    pub partitions: BTreeMap<Partition, Money>,
    pub negative_partitions: Vec<(Partition, Money)>,
}

impl ConservationReport {
    pub fn partition_sum(&self) -> Money {
        self.partitions.values().copied().sum()
    }

    pub fn is_conserved(&self) -> bool {
        self.total == self.partition_sum()
    }

    pub fn is_clean(&self) -> bool {
        self.is_conserved() && self.negative_partitions.is_empty()
    }
}

/// Check conservation and non-negativity for one ledger's entries
pub fn check_conservation(kind: LedgerKind, entries: &[AnyEntry]) -> ConservationReport {
    let partitions = partition_balances(entries);
    let negative_partitions = partitions
        .iter()
        .filter(|(_, balance)| balance.is_negative())
        .map(|(partition, balance)| (*partition, *balance))
        .collect();

    ConservationReport {
        kind,
        total: fold_balance(entries),
        partitions,
        negative_partitions,
    }
}

/// Reads balances straight from the ledgers
pub struct BalanceService<'a> {
    storage: &'a Storage,
}

impl<'a> BalanceService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Balance of a ledger, or of one partition within it
    ///
    /// Without a partition the whole ledger's net is returned (for the chama
    /// ledger: pool plus every chama).
    pub fn get_balance(
        &self,
        user: &UserId,
        kind: LedgerKind,
        partition: Option<Partition>,
    ) -> HazinaResult<Money> {
        let entries = self.storage.entries(user, kind)?;
        match partition {
            None => Ok(fold_balance(&entries)),
            Some(partition) => {
                LedgerAddress { kind, partition }.validate()?;
                Ok(balance_for(&entries, partition))
            }
        }
    }

    /// Balance of the pool at `address`
    pub fn balance_at(&self, user: &UserId, address: LedgerAddress) -> HazinaResult<Money> {
        self.get_balance(user, address.kind, Some(address.partition))
    }

    pub fn partition_balances(
        &self,
        user: &UserId,
        kind: LedgerKind,
    ) -> HazinaResult<BTreeMap<Partition, Money>> {
        Ok(partition_balances(&self.storage.entries(user, kind)?))
    }

    pub fn conservation(
        &self,
        user: &UserId,
        kind: LedgerKind,
    ) -> HazinaResult<ConservationReport> {
        Ok(check_conservation(kind, &self.storage.entries(user, kind)?))
    }
}
