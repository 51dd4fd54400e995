//! Ledger service
//!
//! Lists ledger entries and records manual withdrawals. A withdrawal is a
//! single decrease entry; the pool must hold at least the amount.

use tracing::info;

use crate::error::{HazinaError, HazinaResult};
use crate::models::{
    AnyEntry, Direction, EntryMeta, LedgerAddress, LedgerKind, Money, Partition, UserId,
};
use crate::services::balance::BalanceService;
use crate::services::chama::ChamaService;
use crate::storage::Storage;

/// Service for reading ledgers and manual withdrawals
pub struct LedgerService<'a> {
    storage: &'a Storage,
}

impl<'a> LedgerService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Entries of a ledger, newest first, optionally limited to one partition
    pub fn list_entries(
        &self,
        user: &UserId,
        kind: LedgerKind,
        partition: Option<Partition>,
    ) -> HazinaResult<Vec<AnyEntry>> {
        if let Some(partition) = partition {
            LedgerAddress { kind, partition }.validate()?;
        }

        let mut entries: Vec<_> = self
            .storage
            .entries(user, kind)?
            .into_iter()
            .filter(|e| partition.map_or(true, |p| e.partition() == p))
            .collect();
        entries.sort_by(|a, b| b.meta().timestamp.cmp(&a.meta().timestamp));
        Ok(entries)
    }

    /// Withdraw from the pool at `address`
    ///
    /// Fails with `InvalidAmount` unless `0 < amount`, and with
    /// `InsufficientFunds` when the amount exceeds the current balance.
    pub fn withdraw(
        &self,
        user: &UserId,
        address: LedgerAddress,
        amount: Money,
        note: &str,
    ) -> HazinaResult<AnyEntry> {
        if !amount.is_positive() {
            return Err(HazinaError::InvalidAmount(format!(
                "Withdrawal amount must be positive, got {}",
                amount
            )));
        }
        address.validate()?;
        if let Partition::Chama(id) = address.partition {
            ChamaService::new(self.storage).require(user, id)?;
        }

        let available = BalanceService::new(self.storage).balance_at(user, address)?;
        if amount > available {
            return Err(HazinaError::InsufficientFunds {
                pool: address.to_string(),
                needed: amount,
                available,
            });
        }

        let meta = EntryMeta::new(amount, address.kind.manual_withdrawal_source())
            .with_note(note.trim());
        let entry = self
            .storage
            .append_entry(user, address, Direction::Decrease, meta)?;

        info!(user = %user, pool = %address, amount = %amount, "Recorded withdrawal");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntrySource, SavingsEntry, UnallocatedEntry};
    use crate::storage::testing::{temp_storage, test_user};
    use chrono::{Duration, Utc};

    fn seed_savings(storage: &Storage, units: i64) {
        let meta = EntryMeta::new(Money::from_units(units), EntrySource::Manual);
        storage
            .append(&storage.savings, &test_user(), SavingsEntry::deposit(meta))
            .unwrap();
    }

    #[test]
    fn test_withdraw_full_balance() {
        let (_temp, storage) = temp_storage();
        seed_savings(&storage, 1_000);
        let service = LedgerService::new(&storage);

        let entry = service
            .withdraw(&test_user(), LedgerAddress::savings(), Money::from_units(1_000), "rent")
            .unwrap();

        assert_eq!(entry.direction(), Direction::Decrease);
        assert_eq!(entry.meta().source, EntrySource::Manual);
        let balance = BalanceService::new(&storage)
            .balance_at(&test_user(), LedgerAddress::savings())
            .unwrap();
        assert_eq!(balance, Money::zero());
    }

    #[test]
    fn test_withdraw_one_cent_over_fails() {
        let (_temp, storage) = temp_storage();
        seed_savings(&storage, 1_000);
        let service = LedgerService::new(&storage);

        let err = service
            .withdraw(
                &test_user(),
                LedgerAddress::savings(),
                Money::from_cents(100_001),
                "",
            )
            .unwrap_err();

        assert!(matches!(err, HazinaError::InsufficientFunds { .. }));
        assert_eq!(storage.savings.list(&test_user()).unwrap().len(), 1);
    }

    #[test]
    fn test_withdraw_rejects_non_positive() {
        let (_temp, storage) = temp_storage();
        let service = LedgerService::new(&storage);

        let err = service
            .withdraw(&test_user(), LedgerAddress::savings(), Money::zero(), "")
            .unwrap_err();
        assert!(matches!(err, HazinaError::InvalidAmount(_)));
    }

    #[test]
    fn test_unallocated_withdrawal_source() {
        let (_temp, storage) = temp_storage();
        let user = test_user();
        let meta = EntryMeta::new(Money::from_units(500), EntrySource::HistoricalMigration);
        storage
            .append(&storage.unallocated, &user, UnallocatedEntry::deposit(meta))
            .unwrap();

        let entry = LedgerService::new(&storage)
            .withdraw(&user, LedgerAddress::unallocated(), Money::from_units(200), "")
            .unwrap();
        assert_eq!(entry.meta().source, EntrySource::ManualWithdrawal);
    }

    #[test]
    fn test_withdraw_from_unknown_chama() {
        let (_temp, storage) = temp_storage();
        let err = LedgerService::new(&storage)
            .withdraw(
                &test_user(),
                LedgerAddress::chama(crate::models::ChamaId::new()),
                Money::from_units(1),
                "",
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_entries_newest_first() {
        let (_temp, storage) = temp_storage();
        let user = test_user();
        let now = Utc::now();
        for (units, age) in [(10, 3), (20, 1), (30, 2)] {
            let meta = EntryMeta::new(Money::from_units(units), EntrySource::Manual)
                .at(now - Duration::days(age));
            storage
                .append(&storage.savings, &user, SavingsEntry::deposit(meta))
                .unwrap();
        }

        let amounts: Vec<_> = LedgerService::new(&storage)
            .list_entries(&user, LedgerKind::Savings, None)
            .unwrap()
            .iter()
            .map(|e| e.amount())
            .collect();
        assert_eq!(
            amounts,
            vec![Money::from_units(20), Money::from_units(30), Money::from_units(10)]
        );
    }
}
