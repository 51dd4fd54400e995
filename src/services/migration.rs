//! Migration and backfill engine
//!
//! One-off jobs that bring ledgers in line with data recorded before the
//! ledgers existed. Every write uses an id derived from the record it comes
//! from, so running a migration again creates nothing new.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{error, info};

use crate::error::{HazinaError, HazinaResult};
use crate::models::{
    BudgetMonth, ChamaEntry, ChamaId, Direction, EntryId, EntryMeta, EntrySource, LedgerEntry,
    Money, SavingsEntry, Transaction, TransactionId, TransferId, UnallocatedEntry, UserId,
};
use crate::services::budget::BudgetService;
use crate::services::chama::ChamaService;
use crate::services::transaction::{savings_deposit_id, TransactionService};
use crate::storage::Storage;

const UNALLOCATED_NAMESPACE: &str = "unallocated-backfill";
const CONTRIBUTION_NAMESPACE: &str = "chama-correction";
const REVERSAL_NAMESPACE: &str = "chama-correction-reversal";
const EXCESS_NAMESPACE: &str = "excess";

const ADJUSTMENT_NOTE: &str = "Migrated to chama ledger";

/// One transaction to move from savings into a chama
///
/// The savings withdrawal must equal the chama contribution plus the excess
/// (`chama_amount + excess == savings_amount`), so the money leaving savings
/// is fully accounted for. A plan with an item that does not add up is
/// rejected with `Validation` before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionItem {
    pub transaction_id: TransactionId,
    /// Amount withdrawn from savings
    pub savings_amount: Money,
    /// Amount contributed to the chama
    pub chama_amount: Money,
    /// Remainder booked as a new transaction
    pub excess: Money,
}

impl CorrectionItem {
    pub fn new(transaction_id: TransactionId, chama_amount: Money, excess: Money) -> Self {
        Self {
            transaction_id,
            savings_amount: chama_amount + excess,
            chama_amount,
            excess,
        }
    }

    fn validate(&self) -> HazinaResult<()> {
        if !self.savings_amount.is_positive() || !self.chama_amount.is_positive() {
            return Err(HazinaError::InvalidAmount(format!(
                "Correction amounts for {} must be positive",
                self.transaction_id
            )));
        }
        if self.excess.is_negative() {
            return Err(HazinaError::InvalidAmount(format!(
                "Excess for {} cannot be negative",
                self.transaction_id
            )));
        }
        if self.chama_amount + self.excess != self.savings_amount {
            return Err(HazinaError::Validation(format!(
                "Correction for {} does not add up: {} + {} != {}",
                self.transaction_id, self.chama_amount, self.excess, self.savings_amount
            )));
        }
        Ok(())
    }
}

/// Savings transactions to reclassify as contributions to one chama
#[derive(Debug, Clone, PartialEq)]
pub struct ChamaCorrectionPlan {
    pub chama_id: ChamaId,
    /// Month receiving excess transactions; defaults to the configured month
    pub target_budget_month: Option<BudgetMonth>,
    pub items: Vec<CorrectionItem>,
}

/// Which migration to run
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationKind {
    /// Deposit every savings transaction that has no savings entry
    SavingsBackfill,
    /// Deposit each month's positive surplus into the unallocated ledger
    UnallocatedBackfill,
    ChamaCorrection(ChamaCorrectionPlan),
}

impl MigrationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SavingsBackfill => "savings-backfill",
            Self::UnallocatedBackfill => "unallocated-backfill",
            Self::ChamaCorrection(_) => "chama-correction",
        }
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of a migration run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub kind: &'static str,
    pub created: usize,
    pub skipped: usize,
    pub details: Vec<String>,
}

impl MigrationReport {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    fn created(&mut self, detail: String) {
        self.created += 1;
        self.details.push(detail);
    }

    fn skipped(&mut self, detail: String) {
        self.skipped += 1;
        self.details.push(detail);
    }
}

/// Midnight UTC on the transaction date
fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Service running migrations and backfills
pub struct MigrationService<'a> {
    storage: &'a Storage,
}

impl<'a> MigrationService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn run_migration(&self, user: &UserId, kind: MigrationKind) -> HazinaResult<MigrationReport> {
        let report = match &kind {
            MigrationKind::SavingsBackfill => self.backfill_savings(user)?,
            MigrationKind::UnallocatedBackfill => self.backfill_unallocated(user)?,
            MigrationKind::ChamaCorrection(plan) => self.correct_chama(user, plan)?,
        };

        info!(
            user = %user,
            kind = %kind,
            created = report.created,
            skipped = report.skipped,
            "Migration finished"
        );
        Ok(report)
    }

    fn backfill_savings(&self, user: &UserId) -> HazinaResult<MigrationReport> {
        let mut report = MigrationReport::new(MigrationKind::SavingsBackfill.name());
        let savings_category = &self.storage.settings().savings_category;

        let processed: HashSet<TransactionId> = self
            .storage
            .savings
            .list(user)?
            .iter()
            .filter(|e| e.direction() == Direction::Increase)
            .filter_map(|e| e.meta.related_transaction_id)
            .collect();

        let transactions = self.storage.transactions.list(user)?;
        for txn in transactions.iter().filter(|t| t.is_in(savings_category)) {
            let id = savings_deposit_id(txn.id);
            if processed.contains(&txn.id) || self.storage.savings.contains(user, id)? {
                report.skipped(format!("{} already deposited", txn.id));
                continue;
            }

            let meta = EntryMeta::new(txn.amount, EntrySource::HistoricalMigration)
                .with_id(id)
                .related_to(txn.id)
                .for_month(txn.budget_month);
            self.storage
                .append(&self.storage.savings, user, SavingsEntry::deposit(meta))?;
            report.created(format!("Deposited {} for {}", txn.amount, txn.id));
        }

        Ok(report)
    }

    fn backfill_unallocated(&self, user: &UserId) -> HazinaResult<MigrationReport> {
        let mut report = MigrationReport::new(MigrationKind::UnallocatedBackfill.name());

        let processed: HashSet<BudgetMonth> = self
            .storage
            .unallocated
            .list(user)?
            .iter()
            .filter(|e| e.meta.source == EntrySource::HistoricalMigration)
            .filter_map(|e| e.meta.budget_month)
            .collect();

        for budget in BudgetService::new(self.storage).list(user)? {
            let surplus = budget.surplus();
            if !surplus.is_positive() {
                continue;
            }

            let id = EntryId::derived(UNALLOCATED_NAMESPACE, budget.month);
            if processed.contains(&budget.month) || self.storage.unallocated.contains(user, id)? {
                report.skipped(format!("{} already backfilled", budget.month));
                continue;
            }

            let meta = EntryMeta::new(surplus, EntrySource::HistoricalMigration)
                .with_id(id)
                .for_month(budget.month);
            self.storage
                .append(&self.storage.unallocated, user, UnallocatedEntry::deposit(meta))?;
            report.created(format!("Deposited surplus {} for {}", surplus, budget.month));
        }

        Ok(report)
    }

    /// Check every item before the first write
    fn prepare_correction(
        &self,
        user: &UserId,
        plan: &ChamaCorrectionPlan,
        target_month: BudgetMonth,
    ) -> HazinaResult<Vec<(CorrectionItem, Transaction)>> {
        ChamaService::new(self.storage).require_open(user, plan.chama_id)?;
        let budgets = BudgetService::new(self.storage);
        if plan.items.iter().any(|item| item.excess.is_positive()) {
            budgets.require(user, target_month)?;
        }

        let transactions = TransactionService::new(self.storage);
        plan.items
            .iter()
            .map(|item| {
                item.validate()?;
                let txn = transactions.require(user, item.transaction_id)?;
                Ok((item.clone(), txn))
            })
            .collect()
    }

    fn correct_chama(&self, user: &UserId, plan: &ChamaCorrectionPlan) -> HazinaResult<MigrationReport> {
        let mut report = MigrationReport::new("chama-correction");
        let target_month = plan
            .target_budget_month
            .unwrap_or(self.storage.settings().correction_budget_month);
        let prepared = self.prepare_correction(user, plan, target_month)?;

        for (item, txn) in prepared {
            if txn.adjusted {
                report.skipped(format!("{} already adjusted", txn.id));
                continue;
            }
            self.correct_item(user, plan.chama_id, target_month, &item, &txn)?;
            report.created(format!(
                "Moved {} of {} into chama {}",
                item.chama_amount, txn.id, plan.chama_id
            ));
        }

        Ok(report)
    }

    /// Run the four correction steps for one transaction
    ///
    /// Steps already written by an earlier, interrupted run are detected by
    /// their derived ids and not repeated.
    fn correct_item(
        &self,
        user: &UserId,
        chama_id: ChamaId,
        target_month: BudgetMonth,
        item: &CorrectionItem,
        txn: &Transaction,
    ) -> HazinaResult<()> {
        let timestamp = start_of_day(txn.date_of_transaction);
        let mut written: Vec<EntryId> = Vec::new();
        let fail = |step: &str, written: Vec<EntryId>, e: HazinaError| {
            error!(
                user = %user,
                transaction = %txn.id,
                step,
                error = %e,
                "Chama correction stopped part way"
            );
            HazinaError::ReconciliationNeeded {
                transfer_id: TransferId::derived(CONTRIBUTION_NAMESPACE, txn.id.as_uuid()),
                written,
                detail: format!("{} failed for transaction {}: {}", step, txn.id, e),
            }
        };

        let contribution_id = EntryId::derived(CONTRIBUTION_NAMESPACE, txn.id.as_uuid());
        if !self.storage.chama_ledger.contains(user, contribution_id)? {
            let meta = EntryMeta::new(item.chama_amount, EntrySource::Migration)
                .with_id(contribution_id)
                .at(timestamp)
                .related_to(txn.id)
                .for_month(txn.budget_month)
                .with_note(format!("Migrated from savings transaction {}", txn.id));
            self.storage
                .append(&self.storage.chama_ledger, user, ChamaEntry::contribution(Some(chama_id), meta))
                .map_err(|e| fail("chama contribution", written.clone(), e))?;
            written.push(contribution_id);
        }

        let reversal_id = EntryId::derived(REVERSAL_NAMESPACE, txn.id.as_uuid());
        if !self.storage.savings.contains(user, reversal_id)? {
            let meta = EntryMeta::new(item.savings_amount, EntrySource::MigrationReversal)
                .with_id(reversal_id)
                .at(timestamp)
                .related_to(txn.id)
                .for_month(txn.budget_month)
                .with_note(format!("Reversal due to chama migration ({})", txn.id));
            self.storage
                .append(&self.storage.savings, user, SavingsEntry::withdrawal(meta))
                .map_err(|e| fail("savings reversal", written.clone(), e))?;
            written.push(reversal_id);
        }

        if item.excess.is_positive() {
            let excess_id = TransactionId::derived(EXCESS_NAMESPACE, txn.id.as_uuid());
            let transactions = TransactionService::new(self.storage);
            if transactions.get(user, excess_id)?.is_none() {
                let mut excess = Transaction::new(
                    self.storage.settings().excess_category.clone(),
                    item.excess,
                    target_month,
                    txn.date_of_transaction,
                )
                .with_note(format!("Correction: excess from chama contribution ({})", txn.id));
                excess.id = excess_id;
                excess.related_transaction_id = Some(txn.id);
                transactions
                    .create_from_migration(user, excess)
                    .map_err(|e| fail("excess transaction", written.clone(), e))?;
            }
        }

        TransactionService::new(self.storage)
            .mark_adjusted(user, txn.id, ADJUSTMENT_NOTE)
            .map_err(|e| fail("mark adjusted", written.clone(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetCategory, LedgerAddress, LedgerKind, TransactionOrigin};
    use crate::services::balance::BalanceService;
    use crate::storage::testing::{flaky_storage, temp_storage, test_user};

    fn month(s: &str) -> BudgetMonth {
        BudgetMonth::parse(s).unwrap()
    }

    fn create_budget(storage: &Storage, m: &str, planned: &[(&str, i64)], debited: i64) {
        let categories = planned
            .iter()
            .map(|(name, units)| BudgetCategory::new(*name, Money::from_units(*units)))
            .collect();
        BudgetService::new(storage)
            .create_budget(&test_user(), month(m), categories, Money::from_units(debited))
            .unwrap();
    }

    fn savings_txn(storage: &Storage, m: &str, units: i64) -> Transaction {
        let date = month(m).start_date();
        TransactionService::new(storage)
            .create(
                &test_user(),
                Transaction::new("Savings", Money::from_units(units), month(m), date),
            )
            .unwrap()
            .transaction
    }

    fn balance(storage: &Storage, address: LedgerAddress) -> Money {
        BalanceService::new(storage)
            .balance_at(&test_user(), address)
            .unwrap()
    }

    #[test]
    fn test_unallocated_backfill() {
        let (_temp, storage) = temp_storage();
        create_budget(&storage, "2025-06", &[("Rent", 25_000), ("Food", 15_000)], 45_000);
        create_budget(&storage, "2025-07", &[("Rent", 25_000), ("Food", 15_000)], 38_000);
        let service = MigrationService::new(&storage);

        let report = service
            .run_migration(&test_user(), MigrationKind::UnallocatedBackfill)
            .unwrap();
        assert_eq!(report.created, 1);

        let entries = storage.unallocated.list(&test_user()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].meta.amount, Money::from_units(5_000));
        assert_eq!(entries[0].meta.budget_month, Some(month("2025-06")));
        assert_eq!(entries[0].meta.source, EntrySource::HistoricalMigration);

        let rerun = service
            .run_migration(&test_user(), MigrationKind::UnallocatedBackfill)
            .unwrap();
        assert_eq!(rerun.created, 0);
        assert_eq!(rerun.skipped, 1);
        assert_eq!(storage.unallocated.list(&test_user()).unwrap().len(), 1);
    }

    #[test]
    fn test_savings_backfill_fills_gaps_once() {
        let flaky = flaky_storage();
        let storage = &flaky.storage;
        create_budget(storage, "2025-06", &[("Savings", 10_000)], 10_000);

        savings_txn(storage, "2025-06", 1_000);
        flaky.savings.fail_inserts_after(0);
        savings_txn(storage, "2025-06", 2_000);
        flaky.savings.heal();
        assert_eq!(balance(storage, LedgerAddress::savings()), Money::from_units(1_000));

        let service = MigrationService::new(storage);
        let report = service
            .run_migration(&test_user(), MigrationKind::SavingsBackfill)
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(balance(storage, LedgerAddress::savings()), Money::from_units(3_000));

        let rerun = service
            .run_migration(&test_user(), MigrationKind::SavingsBackfill)
            .unwrap();
        assert_eq!(rerun.created, 0);
        assert_eq!(balance(storage, LedgerAddress::savings()), Money::from_units(3_000));
    }

    fn correction_setup(storage: &Storage) -> (ChamaId, Transaction, Transaction) {
        create_budget(storage, "2025-06", &[("Savings", 10_000)], 10_000);
        create_budget(storage, "2026-01", &[("Miscellaneous", 1_000)], 1_000);
        let chama = ChamaService::new(storage)
            .create_chama(&test_user(), "Chama One", "")
            .unwrap();
        let exact = savings_txn(storage, "2025-06", 3_000);
        let with_excess = savings_txn(storage, "2025-06", 3_015);
        (chama.id, exact, with_excess)
    }

    fn plan(chama_id: ChamaId, exact: &Transaction, with_excess: &Transaction) -> MigrationKind {
        MigrationKind::ChamaCorrection(ChamaCorrectionPlan {
            chama_id,
            target_budget_month: None,
            items: vec![
                CorrectionItem::new(exact.id, Money::from_units(3_000), Money::zero()),
                CorrectionItem::new(with_excess.id, Money::from_units(3_000), Money::from_units(15)),
            ],
        })
    }

    #[test]
    fn test_chama_correction() {
        let (_temp, storage) = temp_storage();
        let (chama_id, exact, with_excess) = correction_setup(&storage);
        let service = MigrationService::new(&storage);

        let report = service
            .run_migration(&test_user(), plan(chama_id, &exact, &with_excess))
            .unwrap();
        assert_eq!(report.created, 2);

        assert_eq!(balance(&storage, LedgerAddress::savings()), Money::zero());
        assert_eq!(
            balance(&storage, LedgerAddress::chama(chama_id)),
            Money::from_units(6_000)
        );

        let transactions = TransactionService::new(&storage);
        assert!(transactions.require(&test_user(), exact.id).unwrap().adjusted);
        let excess = transactions
            .require(&test_user(), TransactionId::derived(EXCESS_NAMESPACE, with_excess.id.as_uuid()))
            .unwrap();
        assert_eq!(excess.amount, Money::from_units(15));
        assert_eq!(excess.category, "Miscellaneous");
        assert_eq!(excess.budget_month, month("2026-01"));
        assert_eq!(excess.origin, TransactionOrigin::Migration);
        assert_eq!(excess.related_transaction_id, Some(with_excess.id));

        let rerun = service
            .run_migration(&test_user(), plan(chama_id, &exact, &with_excess))
            .unwrap();
        assert_eq!(rerun.created, 0);
        assert_eq!(rerun.skipped, 2);
        assert_eq!(storage.chama_ledger.list(&test_user()).unwrap().len(), 2);
    }

    #[test]
    fn test_correction_checks_everything_before_writing() {
        let (_temp, storage) = temp_storage();
        let (chama_id, exact, _) = correction_setup(&storage);

        let kind = MigrationKind::ChamaCorrection(ChamaCorrectionPlan {
            chama_id,
            target_budget_month: None,
            items: vec![
                CorrectionItem::new(exact.id, Money::from_units(3_000), Money::zero()),
                CorrectionItem::new(TransactionId::new(), Money::from_units(10), Money::zero()),
            ],
        });
        let err = MigrationService::new(&storage)
            .run_migration(&test_user(), kind)
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(storage.chama_ledger.list(&test_user()).unwrap().is_empty());
    }

    #[test]
    fn test_correction_rejects_items_that_do_not_add_up() {
        let (_temp, storage) = temp_storage();
        let (chama_id, exact, _) = correction_setup(&storage);

        let mut item = CorrectionItem::new(exact.id, Money::from_units(3_000), Money::zero());
        item.savings_amount = Money::from_units(3_100);
        let kind = MigrationKind::ChamaCorrection(ChamaCorrectionPlan {
            chama_id,
            target_budget_month: None,
            items: vec![item],
        });
        let err = MigrationService::new(&storage)
            .run_migration(&test_user(), kind)
            .unwrap_err();

        assert!(matches!(err, HazinaError::Validation(_)));
        assert!(storage.chama_ledger.list(&test_user()).unwrap().is_empty());
    }

    #[test]
    fn test_correction_requires_target_budget_for_excess() {
        let (_temp, storage) = temp_storage();
        create_budget(&storage, "2025-06", &[("Savings", 10_000)], 10_000);
        let chama = ChamaService::new(&storage)
            .create_chama(&test_user(), "Chama One", "")
            .unwrap();
        let txn = savings_txn(&storage, "2025-06", 3_015);

        let kind = MigrationKind::ChamaCorrection(ChamaCorrectionPlan {
            chama_id: chama.id,
            target_budget_month: None,
            items: vec![CorrectionItem::new(txn.id, Money::from_units(3_000), Money::from_units(15))],
        });
        let err = MigrationService::new(&storage)
            .run_migration(&test_user(), kind)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_correction_resumes_after_partial_failure() {
        let flaky = flaky_storage();
        let storage = &flaky.storage;
        let (chama_id, exact, with_excess) = correction_setup(storage);

        flaky.savings.fail_inserts_after(0);
        let err = MigrationService::new(storage)
            .run_migration(&test_user(), plan(chama_id, &exact, &with_excess))
            .unwrap_err();
        match err {
            HazinaError::ReconciliationNeeded { written, .. } => assert_eq!(written.len(), 1),
            other => panic!("unexpected error: {other}"),
        }

        flaky.savings.heal();
        MigrationService::new(storage)
            .run_migration(&test_user(), plan(chama_id, &exact, &with_excess))
            .unwrap();

        assert_eq!(storage.chama_ledger.list(&test_user()).unwrap().len(), 2);
        assert_eq!(
            BalanceService::new(storage)
                .get_balance(&test_user(), LedgerKind::Savings, None)
                .unwrap(),
            Money::zero()
        );
    }
    #[test]
    fn test_correction_adjust_failure_keeps_ledger_writes() {
        let flaky = flaky_storage();
        let storage = &flaky.storage;
        let user = test_user();
        let (chama_id, _, with_excess) = correction_setup(storage);
        let kind = || {
            MigrationKind::ChamaCorrection(ChamaCorrectionPlan {
                chama_id,
                target_budget_month: None,
                items: vec![CorrectionItem::new(
                    with_excess.id,
                    Money::from_units(3_000),
                    Money::from_units(15),
                )],
            })
        };

        flaky.transactions.fail_updates();
        let err = MigrationService::new(storage)
            .run_migration(&user, kind())
            .unwrap_err();
        match err {
            HazinaError::ReconciliationNeeded { written, detail, .. } => {
                assert_eq!(
                    written,
                    vec![
                        EntryId::derived(CONTRIBUTION_NAMESPACE, with_excess.id.as_uuid()),
                        EntryId::derived(REVERSAL_NAMESPACE, with_excess.id.as_uuid()),
                    ]
                );
                assert!(detail.contains("mark adjusted"));
            }
            other => panic!("unexpected error: {other}"),
        }
        let transactions = TransactionService::new(storage);
        assert!(!transactions.require(&user, with_excess.id).unwrap().adjusted);

        flaky.transactions.heal();
        let report = MigrationService::new(storage)
            .run_migration(&user, kind())
            .unwrap();
        assert_eq!(report.created, 1);

        assert!(transactions.require(&user, with_excess.id).unwrap().adjusted);
        assert_eq!(storage.chama_ledger.list(&user).unwrap().len(), 1);
        assert_eq!(storage.savings.list(&user).unwrap().len(), 3);
        assert_eq!(transactions.list(&user).unwrap().len(), 3);
        assert_eq!(
            balance(storage, LedgerAddress::chama(chama_id)),
            Money::from_units(3_000)
        );
    }
}
