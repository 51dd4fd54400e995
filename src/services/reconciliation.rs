//! Reconciliation job
//!
//! Scans the ledgers for states the write protocols can leave behind when a
//! store write fails part way: transfers with a debit but no credit, and
//! savings transactions whose deposit never landed. Orphaned transfers can
//! be repaired by crediting the amount back to the source.

use std::collections::{BTreeMap, HashSet};

use tracing::{info, warn};

use crate::error::HazinaResult;
use crate::models::{
    AnyEntry, Direction, EntryId, EntryMeta, EntrySource, LedgerAddress, LedgerKind, Money,
    TransactionId, TransferId, UserId,
};
use crate::services::balance::{check_conservation, ConservationReport};
use crate::storage::Storage;

const REPAIR_NAMESPACE: &str = "reconciliation";

/// A transfer whose source was debited but whose destination was never credited
#[derive(Debug, Clone, PartialEq)]
pub struct OrphanedTransfer {
    pub transfer_id: TransferId,
    pub source: LedgerAddress,
    pub amount: Money,
    pub debit_id: EntryId,
}

#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    /// One report per ledger kind
    pub conservation: Vec<ConservationReport>,
    pub orphaned_transfers: Vec<OrphanedTransfer>,
    /// Savings transactions without a savings deposit
    pub missing_savings_deposits: Vec<TransactionId>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.conservation.iter().all(ConservationReport::is_clean)
            && self.orphaned_transfers.is_empty()
            && self.missing_savings_deposits.is_empty()
    }

    /// Human readable findings, empty when consistent
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for report in &self.conservation {
            if !report.is_conserved() {
                warnings.push(format!(
                    "{} ledger total {} does not match its partitions ({})",
                    report.kind,
                    report.total,
                    report.partition_sum()
                ));
            }
            for (partition, balance) in &report.negative_partitions {
                warnings.push(format!(
                    "{} ledger {} is negative: {}",
                    report.kind, partition, balance
                ));
            }
        }
        for orphan in &self.orphaned_transfers {
            warnings.push(format!(
                "Transfer {} debited {} from {} without a matching credit",
                orphan.transfer_id, orphan.amount, orphan.source
            ));
        }
        for id in &self.missing_savings_deposits {
            warnings.push(format!("Savings transaction {} has no savings deposit", id));
        }
        warnings
    }
}

/// Find transfers with a decrease and no increase across all ledgers
fn find_orphans(entries: &[AnyEntry]) -> Vec<OrphanedTransfer> {
    let mut transfers: BTreeMap<TransferId, Vec<&AnyEntry>> = BTreeMap::new();
    for entry in entries {
        if let Some(transfer_id) = entry.meta().transfer_id {
            transfers.entry(transfer_id).or_default().push(entry);
        }
    }

    transfers
        .into_iter()
        .filter(|(_, halves)| halves.iter().all(|e| e.direction() == Direction::Decrease))
        .flat_map(|(transfer_id, halves)| {
            halves.into_iter().map(move |debit| OrphanedTransfer {
                transfer_id,
                source: debit.address(),
                amount: debit.amount(),
                debit_id: debit.meta().id,
            })
        })
        .collect()
}

/// Service scanning and repairing ledger inconsistencies
pub struct ReconciliationService<'a> {
    storage: &'a Storage,
}

impl<'a> ReconciliationService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn scan(&self, user: &UserId) -> HazinaResult<ReconciliationReport> {
        let mut all_entries = Vec::new();
        let mut conservation = Vec::with_capacity(LedgerKind::ALL.len());
        for kind in LedgerKind::ALL {
            let entries = self.storage.entries(user, kind)?;
            conservation.push(check_conservation(kind, &entries));
            all_entries.extend(entries);
        }

        let deposited: HashSet<TransactionId> = all_entries
            .iter()
            .filter(|e| e.kind() == LedgerKind::Savings && e.direction() == Direction::Increase)
            .filter_map(|e| e.meta().related_transaction_id)
            .collect();
        let savings_category = &self.storage.settings().savings_category;
        let missing_savings_deposits = self
            .storage
            .transactions
            .list(user)?
            .into_iter()
            .filter(|t| t.is_in(savings_category) && !deposited.contains(&t.id))
            .map(|t| t.id)
            .collect();

        let report = ReconciliationReport {
            conservation,
            orphaned_transfers: find_orphans(&all_entries),
            missing_savings_deposits,
        };
        if !report.is_consistent() {
            warn!(
                user = %user,
                findings = report.warnings().len(),
                "Ledgers need reconciliation"
            );
        }
        Ok(report)
    }

    /// Credit every orphaned transfer back to its source
    ///
    /// The compensating entry reuses the transfer id, so a repaired transfer
    /// no longer shows up as orphaned.
    pub fn repair_orphans(&self, user: &UserId) -> HazinaResult<Vec<AnyEntry>> {
        let report = self.scan(user)?;
        let mut repaired = Vec::with_capacity(report.orphaned_transfers.len());

        for orphan in report.orphaned_transfers {
            let meta = EntryMeta::new(orphan.amount, EntrySource::Reconciliation)
                .with_id(EntryId::derived(REPAIR_NAMESPACE, orphan.debit_id.as_uuid()))
                .in_transfer(orphan.transfer_id)
                .with_note(format!("Reversal of incomplete transfer {}", orphan.transfer_id));
            let entry = self
                .storage
                .append_entry(user, orphan.source, Direction::Increase, meta)?;

            info!(
                user = %user,
                transfer_id = %orphan.transfer_id,
                source = %orphan.source,
                amount = %orphan.amount,
                "Repaired orphaned transfer"
            );
            repaired.push(entry);
        }

        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetCategory, BudgetMonth, ChamaId, Transaction};
    use crate::services::allocation::AllocationService;
    use crate::services::balance::BalanceService;
    use crate::services::budget::BudgetService;
    use crate::services::chama::ChamaService;
    use crate::services::transaction::TransactionService;
    use crate::storage::testing::{flaky_storage, temp_storage, test_user};

    fn seed_chama_pool(storage: &Storage, units: i64) {
        let meta = EntryMeta::new(Money::from_units(units), EntrySource::Manual);
        storage
            .append_entry(&test_user(), LedgerAddress::chama_pool(), Direction::Increase, meta)
            .unwrap();
    }

    #[test]
    fn test_clean_ledgers_are_consistent() {
        let (_temp, storage) = temp_storage();
        seed_chama_pool(&storage, 5_000);
        let chama = ChamaService::new(&storage)
            .create_chama(&test_user(), "Chama One", "")
            .unwrap();
        AllocationService::new(&storage)
            .allocate(
                &test_user(),
                LedgerAddress::chama_pool(),
                Some(LedgerAddress::chama(chama.id)),
                Money::from_units(3_000),
                "",
            )
            .unwrap();

        let report = ReconciliationService::new(&storage).scan(&test_user()).unwrap();
        assert!(report.is_consistent());
        assert!(report.warnings().is_empty());
        assert_eq!(report.conservation.len(), 3);
    }

    #[test]
    fn test_repair_orphan_after_failed_credit() {
        let flaky = flaky_storage();
        let storage = &flaky.storage;
        let user = test_user();
        seed_chama_pool(storage, 5_000);
        let chama = ChamaService::new(storage)
            .create_chama(&user, "Chama One", "")
            .unwrap();

        flaky.chama_ledger.fail_inserts_after(1);
        let allocation = AllocationService::new(storage).allocate(
            &user,
            LedgerAddress::chama_pool(),
            Some(LedgerAddress::chama(chama.id)),
            Money::from_units(3_000),
            "",
        );
        assert!(allocation.is_err());
        flaky.chama_ledger.heal();

        let service = ReconciliationService::new(storage);
        let report = service.scan(&user).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.orphaned_transfers.len(), 1);
        assert_eq!(report.orphaned_transfers[0].source, LedgerAddress::chama_pool());
        assert_eq!(report.orphaned_transfers[0].amount, Money::from_units(3_000));

        let repaired = service.repair_orphans(&user).unwrap();
        assert_eq!(repaired.len(), 1);
        assert_eq!(repaired[0].meta().source, EntrySource::Reconciliation);
        assert!(service.scan(&user).unwrap().is_consistent());
        assert!(service.repair_orphans(&user).unwrap().is_empty());

        let pool = BalanceService::new(storage)
            .balance_at(&user, LedgerAddress::chama_pool())
            .unwrap();
        assert_eq!(pool, Money::from_units(5_000));
    }

    #[test]
    fn test_negative_partition_flagged() {
        let (_temp, storage) = temp_storage();
        let meta = EntryMeta::new(Money::from_units(100), EntrySource::Manual);
        storage
            .append_entry(
                &test_user(),
                LedgerAddress::chama(ChamaId::new()),
                Direction::Decrease,
                meta,
            )
            .unwrap();

        let report = ReconciliationService::new(&storage).scan(&test_user()).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.warnings().len(), 1);
    }

    #[test]
    fn test_missing_savings_deposit_flagged() {
        let flaky = flaky_storage();
        let storage = &flaky.storage;
        let june = BudgetMonth::parse("2025-06").unwrap();
        BudgetService::new(storage)
            .create_budget(
                &test_user(),
                june,
                vec![BudgetCategory::new("Savings", Money::from_units(1_000))],
                Money::from_units(1_000),
            )
            .unwrap();

        flaky.savings.fail_inserts_after(0);
        let created = TransactionService::new(storage)
            .create(
                &test_user(),
                Transaction::new("Savings", Money::from_units(500), june, june.start_date()),
            )
            .unwrap();

        let report = ReconciliationService::new(storage).scan(&test_user()).unwrap();
        assert_eq!(report.missing_savings_deposits, vec![created.transaction.id]);
    }
}
