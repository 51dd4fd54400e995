//! Allocation protocol
//!
//! Moves money between two pools, within one ledger or across ledgers
//! (for example unallocated surplus into the chama pool, or the chama pool
//! into a specific chama). An allocation is two appends sharing a
//! `transfer_id`: a decrease on the source, then an increase on the
//! destination. All validation happens before the first write.
//!
//! The store has no multi-document transactions. If the second append
//! fails the source has already been debited; the caller receives
//! `ReconciliationNeeded` and the reconciliation job can repair the orphan.

use tracing::{error, info};

use crate::error::{HazinaError, HazinaResult};
use crate::models::{
    AnyEntry, Direction, EntryMeta, EntrySource, LedgerAddress, Money, Partition, TransferId,
    UserId,
};
use crate::services::balance::BalanceService;
use crate::services::chama::ChamaService;
use crate::storage::Storage;

/// Both halves of a completed allocation
#[derive(Debug, Clone)]
pub struct Allocation {
    pub transfer_id: TransferId,
    pub debit: AnyEntry,
    pub credit: AnyEntry,
}

/// Parse a user-entered amount for an allocation or withdrawal
pub fn parse_amount(input: &str) -> HazinaResult<Money> {
    let amount =
        Money::parse(input).map_err(|_| HazinaError::InvalidAmount(input.trim().to_string()))?;
    if !amount.is_positive() {
        return Err(HazinaError::InvalidAmount(input.trim().to_string()));
    }
    Ok(amount)
}

/// Linkage text written on both halves
fn linkage_note(
    storage: &Storage,
    user: &UserId,
    destination: LedgerAddress,
    note: &str,
) -> HazinaResult<String> {
    let target = match destination.partition {
        Partition::Chama(id) => match storage.chamas.get(user, &id)? {
            Some(chama) => format!("chama {}", chama.name),
            None => destination.to_string(),
        },
        Partition::Pool => destination.to_string(),
    };
    let note = note.trim();
    Ok(if note.is_empty() {
        format!("Allocated to {}", target)
    } else {
        format!("Allocated to {}: {}", target, note)
    })
}

/// Service implementing the two-write allocation protocol
pub struct AllocationService<'a> {
    storage: &'a Storage,
}

impl<'a> AllocationService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn validate(
        &self,
        user: &UserId,
        source: LedgerAddress,
        destination: Option<LedgerAddress>,
        amount: Money,
    ) -> HazinaResult<LedgerAddress> {
        let destination = destination.ok_or(HazinaError::NoDestinationSelected)?;

        if !amount.is_positive() {
            return Err(HazinaError::InvalidAmount(format!(
                "Allocation amount must be positive, got {}",
                amount
            )));
        }

        source.validate()?;
        destination.validate()?;
        if source == destination {
            return Err(HazinaError::Validation(format!(
                "Cannot allocate from {} to itself",
                source
            )));
        }

        let chamas = ChamaService::new(self.storage);
        if let Partition::Chama(id) = source.partition {
            chamas.require(user, id)?;
        }
        if let Partition::Chama(id) = destination.partition {
            chamas.require_open(user, id)?;
        }

        let available = BalanceService::new(self.storage).balance_at(user, source)?;
        if amount > available {
            return Err(HazinaError::InsufficientFunds {
                pool: source.to_string(),
                needed: amount,
                available,
            });
        }

        Ok(destination)
    }

    /// Move `amount` from `source` to `destination`
    pub fn allocate(
        &self,
        user: &UserId,
        source: LedgerAddress,
        destination: Option<LedgerAddress>,
        amount: Money,
        note: &str,
    ) -> HazinaResult<Allocation> {
        let destination = self.validate(user, source, destination, amount)?;

        let transfer_id = TransferId::new();
        let linkage = linkage_note(self.storage, user, destination, note)?;
        let meta = || {
            EntryMeta::new(amount, EntrySource::Manual)
                .with_note(linkage.clone())
                .in_transfer(transfer_id)
        };

        let debit = self
            .storage
            .append_entry(user, source, Direction::Decrease, meta())?;

        let credit = match self
            .storage
            .append_entry(user, destination, Direction::Increase, meta())
        {
            Ok(credit) => credit,
            Err(e) => {
                error!(
                    user = %user,
                    transfer_id = %transfer_id,
                    source = %source,
                    destination = %destination,
                    amount = %amount,
                    error = %e,
                    "Allocation credit failed after debit; reconciliation needed"
                );
                return Err(HazinaError::ReconciliationNeeded {
                    transfer_id,
                    written: vec![debit.meta().id],
                    detail: format!("credit to {} failed: {}", destination, e),
                });
            }
        };

        info!(
            user = %user,
            transfer_id = %transfer_id,
            source = %source,
            destination = %destination,
            amount = %amount,
            "Allocated funds"
        );

        Ok(Allocation {
            transfer_id,
            debit,
            credit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChamaId, ChamaStatus, LedgerKind, UnallocatedEntry};
    use crate::storage::testing::{flaky_storage, temp_storage, test_user};

    fn seed_chama_pool(storage: &Storage, units: i64) {
        let meta = EntryMeta::new(Money::from_units(units), EntrySource::Manual);
        storage
            .append_entry(&test_user(), LedgerAddress::chama_pool(), Direction::Increase, meta)
            .unwrap();
    }

    fn balance(storage: &Storage, address: LedgerAddress) -> Money {
        BalanceService::new(storage)
            .balance_at(&test_user(), address)
            .unwrap()
    }

    fn new_chama(storage: &Storage, name: &str) -> ChamaId {
        ChamaService::new(storage)
            .create_chama(&test_user(), name, "")
            .unwrap()
            .id
    }

    #[test]
    fn test_pool_to_chama_scenario() {
        let (_temp, storage) = temp_storage();
        seed_chama_pool(&storage, 5_000);
        let chama = new_chama(&storage, "Chama One");
        let service = AllocationService::new(&storage);
        let user = test_user();

        let allocation = service
            .allocate(
                &user,
                LedgerAddress::chama_pool(),
                Some(LedgerAddress::chama(chama)),
                Money::from_units(3_000),
                "",
            )
            .unwrap();

        assert_eq!(allocation.debit.meta().transfer_id, Some(allocation.transfer_id));
        assert_eq!(allocation.credit.meta().transfer_id, Some(allocation.transfer_id));
        assert_eq!(allocation.debit.meta().note, "Allocated to chama Chama One");
        assert_eq!(allocation.debit.meta().note, allocation.credit.meta().note);
        assert_eq!(balance(&storage, LedgerAddress::chama_pool()), Money::from_units(2_000));
        assert_eq!(balance(&storage, LedgerAddress::chama(chama)), Money::from_units(3_000));
        assert_eq!(
            BalanceService::new(&storage)
                .get_balance(&user, LedgerKind::Chama, None)
                .unwrap(),
            Money::from_units(5_000)
        );

        let err = service
            .allocate(
                &user,
                LedgerAddress::chama_pool(),
                Some(LedgerAddress::chama(chama)),
                Money::from_units(3_000),
                "",
            )
            .unwrap_err();
        assert!(matches!(err, HazinaError::InsufficientFunds { .. }));
        assert_eq!(balance(&storage, LedgerAddress::chama_pool()), Money::from_units(2_000));
        assert_eq!(balance(&storage, LedgerAddress::chama(chama)), Money::from_units(3_000));
    }

    #[test]
    fn test_cross_ledger_allocation() {
        let (_temp, storage) = temp_storage();
        let user = test_user();
        let meta = EntryMeta::new(Money::from_units(5_000), EntrySource::HistoricalMigration);
        storage
            .append(&storage.unallocated, &user, UnallocatedEntry::deposit(meta))
            .unwrap();

        AllocationService::new(&storage)
            .allocate(
                &user,
                LedgerAddress::unallocated(),
                Some(LedgerAddress::chama_pool()),
                Money::from_units(1_500),
                "March top-up",
            )
            .unwrap();

        assert_eq!(balance(&storage, LedgerAddress::unallocated()), Money::from_units(3_500));
        assert_eq!(balance(&storage, LedgerAddress::chama_pool()), Money::from_units(1_500));
        let entries = storage.unallocated.list(&user).unwrap();
        assert_eq!(entries[1].meta.note, "Allocated to chama pool: March top-up");
    }

    #[test]
    fn test_missing_destination() {
        let (_temp, storage) = temp_storage();
        seed_chama_pool(&storage, 100);

        let err = AllocationService::new(&storage)
            .allocate(&test_user(), LedgerAddress::chama_pool(), None, Money::from_units(10), "")
            .unwrap_err();
        assert!(matches!(err, HazinaError::NoDestinationSelected));
    }

    #[test]
    fn test_same_address_rejected() {
        let (_temp, storage) = temp_storage();
        seed_chama_pool(&storage, 100);

        let err = AllocationService::new(&storage)
            .allocate(
                &test_user(),
                LedgerAddress::chama_pool(),
                Some(LedgerAddress::chama_pool()),
                Money::from_units(10),
                "",
            )
            .unwrap_err();
        assert!(matches!(err, HazinaError::Validation(_)));
    }

    #[test]
    fn test_completed_chama_rejected() {
        let (_temp, storage) = temp_storage();
        seed_chama_pool(&storage, 100);
        let chama = new_chama(&storage, "Done");
        ChamaService::new(&storage)
            .set_status(&test_user(), chama, ChamaStatus::Completed)
            .unwrap();

        let err = AllocationService::new(&storage)
            .allocate(
                &test_user(),
                LedgerAddress::chama_pool(),
                Some(LedgerAddress::chama(chama)),
                Money::from_units(10),
                "",
            )
            .unwrap_err();
        assert!(matches!(err, HazinaError::Validation(_)));
        assert_eq!(storage.chama_ledger.list(&test_user()).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_chama_not_found() {
        let (_temp, storage) = temp_storage();
        seed_chama_pool(&storage, 100);

        let err = AllocationService::new(&storage)
            .allocate(
                &test_user(),
                LedgerAddress::chama_pool(),
                Some(LedgerAddress::chama(ChamaId::new())),
                Money::from_units(10),
                "",
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("3,000").unwrap(), Money::from_units(3_000));
        assert_eq!(parse_amount("KES 12.50").unwrap(), Money::from_cents(1_250));
        assert!(matches!(parse_amount("abc"), Err(HazinaError::InvalidAmount(_))));
        assert!(matches!(parse_amount("0"), Err(HazinaError::InvalidAmount(_))));
        assert!(matches!(parse_amount("-5"), Err(HazinaError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_amount_rejects_doubled_sign() {
        for input in ["--5", "--5.50", "- -5", "- -5.50"] {
            assert!(
                matches!(parse_amount(input), Err(HazinaError::InvalidAmount(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_protocol_sequence_never_goes_negative() {
        let (_temp, storage) = temp_storage();
        let user = test_user();
        seed_chama_pool(&storage, 5_000);
        for address in [LedgerAddress::savings(), LedgerAddress::unallocated()] {
            let meta = EntryMeta::new(Money::from_units(2_000), EntrySource::Manual);
            storage
                .append_entry(&user, address, Direction::Increase, meta)
                .unwrap();
        }
        let one = new_chama(&storage, "Chama One");
        let two = new_chama(&storage, "Chama Two");
        let addresses = [
            LedgerAddress::chama_pool(),
            LedgerAddress::chama(one),
            LedgerAddress::chama(two),
            LedgerAddress::savings(),
            LedgerAddress::unallocated(),
        ];

        let allocations = AllocationService::new(&storage);
        let ledgers = crate::services::LedgerService::new(&storage);
        let balances = BalanceService::new(&storage);
        let mut seed: u64 = 0x2545_f491;
        let mut next = |bound: u64| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (seed >> 33) % bound
        };

        let mut succeeded = 0;
        for _ in 0..120 {
            let source = addresses[next(5) as usize];
            let amount = Money::from_cents(1 + next(300_000) as i64);
            let result = if next(3) == 0 {
                ledgers.withdraw(&user, source, amount, "").map(|_| ())
            } else {
                let destination = addresses[next(5) as usize];
                allocations
                    .allocate(&user, source, Some(destination), amount, "")
                    .map(|_| ())
            };
            match result {
                Ok(()) => succeeded += 1,
                Err(HazinaError::InsufficientFunds { .. }) | Err(HazinaError::Validation(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }

            for kind in LedgerKind::ALL {
                for (partition, amount) in balances.partition_balances(&user, kind).unwrap() {
                    assert!(
                        !amount.is_negative(),
                        "{kind:?} {partition:?} went negative: {amount}"
                    );
                }
            }
        }
        assert!(succeeded > 0);
    }

    #[test]
    fn test_second_write_failure_needs_reconciliation() {
        let flaky = flaky_storage();
        let storage = &flaky.storage;
        let user = test_user();
        seed_chama_pool(storage, 5_000);
        let chama = new_chama(storage, "Chama One");

        flaky.chama_ledger.fail_inserts_after(1);
        let err = AllocationService::new(storage)
            .allocate(
                &user,
                LedgerAddress::chama_pool(),
                Some(LedgerAddress::chama(chama)),
                Money::from_units(3_000),
                "",
            )
            .unwrap_err();

        match err {
            HazinaError::ReconciliationNeeded { written, .. } => assert_eq!(written.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(balance(storage, LedgerAddress::chama_pool()), Money::from_units(2_000));
        assert_eq!(balance(storage, LedgerAddress::chama(chama)), Money::zero());
    }
}
