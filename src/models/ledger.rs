//! Ledger entry models
//!
//! Three append-only ledgers exist per user: savings, chama and unallocated
//! surplus. Each has its own entry type with its own vocabulary
//! (deposit/withdrawal or contribution/payout), built on a shared
//! [`EntryMeta`] base. Amounts are always positive; the entry type carries
//! the direction.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ChamaId, EntryId, TransactionId, TransferId};
use super::money::Money;
use super::period::BudgetMonth;
use crate::error::{HazinaError, HazinaResult};

/// The three ledgers kept for every user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Savings,
    Chama,
    Unallocated,
}

impl LedgerKind {
    pub const ALL: [LedgerKind; 3] = [Self::Savings, Self::Chama, Self::Unallocated];

    /// Name of the backing collection
    pub fn collection_name(&self) -> &'static str {
        match self {
            Self::Savings => "savings_ledger",
            Self::Chama => "chama_ledger",
            Self::Unallocated => "unallocated_ledger",
        }
    }

    /// Source tag for a manual decrease on this ledger
    pub fn manual_withdrawal_source(&self) -> EntrySource {
        match self {
            Self::Unallocated => EntrySource::ManualWithdrawal,
            Self::Savings | Self::Chama => EntrySource::Manual,
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Savings => write!(f, "savings"),
            Self::Chama => write!(f, "chama"),
            Self::Unallocated => write!(f, "unallocated"),
        }
    }
}

/// Whether an entry adds to or takes from its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Increase,
    Decrease,
}

/// Where an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntrySource {
    Transaction,
    Manual,
    ManualWithdrawal,
    HistoricalMigration,
    Migration,
    MigrationReversal,
    Budget,
    Reconciliation,
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transaction => "transaction",
            Self::Manual => "manual",
            Self::ManualWithdrawal => "manual-withdrawal",
            Self::HistoricalMigration => "historical-migration",
            Self::Migration => "migration",
            Self::MigrationReversal => "migration-reversal",
            Self::Budget => "budget",
            Self::Reconciliation => "reconciliation",
        };
        f.write_str(s)
    }
}

/// A balance partition within a ledger
///
/// Savings and unallocated ledgers only have the pool. In the chama ledger
/// the pool holds money not yet assigned to any chama.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Pool,
    Chama(ChamaId),
}

impl Partition {
    pub fn from_chama_id(chama_id: Option<ChamaId>) -> Self {
        match chama_id {
            Some(id) => Self::Chama(id),
            None => Self::Pool,
        }
    }

    pub fn chama_id(&self) -> Option<ChamaId> {
        match self {
            Self::Pool => None,
            Self::Chama(id) => Some(*id),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pool => write!(f, "pool"),
            Self::Chama(id) => write!(f, "chama {}", id),
        }
    }
}

/// A pool addressed by ledger and partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedgerAddress {
    pub kind: LedgerKind,
    pub partition: Partition,
}

impl LedgerAddress {
    pub fn savings() -> Self {
        Self {
            kind: LedgerKind::Savings,
            partition: Partition::Pool,
        }
    }

    pub fn unallocated() -> Self {
        Self {
            kind: LedgerKind::Unallocated,
            partition: Partition::Pool,
        }
    }

    /// The unassigned pool inside the chama ledger
    pub fn chama_pool() -> Self {
        Self {
            kind: LedgerKind::Chama,
            partition: Partition::Pool,
        }
    }

    pub fn chama(id: ChamaId) -> Self {
        Self {
            kind: LedgerKind::Chama,
            partition: Partition::Chama(id),
        }
    }

    /// Reject partitions that cannot exist in the addressed ledger
    pub fn validate(&self) -> HazinaResult<()> {
        match (self.kind, self.partition) {
            (LedgerKind::Chama, _) | (_, Partition::Pool) => Ok(()),
            (kind, partition) => Err(HazinaError::Validation(format!(
                "The {} ledger has no partition '{}'",
                kind, partition
            ))),
        }
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.partition) {
            (LedgerKind::Chama, Partition::Pool) => write!(f, "chama pool"),
            (LedgerKind::Chama, Partition::Chama(id)) => write!(f, "chama {}", id),
            (kind, _) => write!(f, "{} ledger", kind),
        }
    }
}

/// Fields shared by every ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub id: EntryId,

    /// Always positive
    pub amount: Money,

    /// Epoch milliseconds on the wire
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    pub source: EntrySource,

    /// Lookup-only back-reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_transaction_id: Option<TransactionId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_month: Option<BudgetMonth>,

    #[serde(default)]
    pub note: String,

    /// Shared by both halves of an allocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<TransferId>,
}

impl EntryMeta {
    /// New metadata with a random id stamped now
    pub fn new(amount: Money, source: EntrySource) -> Self {
        Self {
            id: EntryId::new(),
            amount,
            timestamp: Utc::now(),
            source,
            related_transaction_id: None,
            budget_month: None,
            note: String::new(),
            transfer_id: None,
        }
    }

    pub fn with_id(mut self, id: EntryId) -> Self {
        self.id = id;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn related_to(mut self, transaction_id: TransactionId) -> Self {
        self.related_transaction_id = Some(transaction_id);
        self
    }

    pub fn for_month(mut self, month: BudgetMonth) -> Self {
        self.budget_month = Some(month);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn in_transfer(mut self, transfer_id: TransferId) -> Self {
        self.transfer_id = Some(transfer_id);
        self
    }
}

/// Contract shared by the per-ledger entry types
pub trait LedgerEntry:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Which ledger this entry type lives in
    const KIND: LedgerKind;

    fn meta(&self) -> &EntryMeta;

    fn direction(&self) -> Direction;

    fn partition(&self) -> Partition;

    /// Build an entry for `partition` moving money in `direction`
    fn build(direction: Direction, partition: Partition, meta: EntryMeta) -> HazinaResult<Self>;

    fn id(&self) -> EntryId {
        self.meta().id
    }

    fn amount(&self) -> Money {
        self.meta().amount
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.meta().timestamp
    }

    fn source(&self) -> EntrySource {
        self.meta().source
    }

    /// Amount with the sign implied by the direction
    fn signed_amount(&self) -> Money {
        match self.direction() {
            Direction::Increase => self.amount(),
            Direction::Decrease => -self.amount(),
        }
    }
}

fn pool_only(kind: LedgerKind, partition: Partition) -> HazinaResult<()> {
    LedgerAddress { kind, partition }.validate()
}

/// Savings ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavingsEntryType {
    Deposit,
    Withdrawal,
}

/// An entry in the savings ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsEntry {
    #[serde(rename = "type")]
    pub entry_type: SavingsEntryType,

    #[serde(flatten)]
    pub meta: EntryMeta,
}

impl SavingsEntry {
    pub fn deposit(meta: EntryMeta) -> Self {
        Self {
            entry_type: SavingsEntryType::Deposit,
            meta,
        }
    }

    pub fn withdrawal(meta: EntryMeta) -> Self {
        Self {
            entry_type: SavingsEntryType::Withdrawal,
            meta,
        }
    }
}

impl LedgerEntry for SavingsEntry {
    const KIND: LedgerKind = LedgerKind::Savings;

    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    fn direction(&self) -> Direction {
        match self.entry_type {
            SavingsEntryType::Deposit => Direction::Increase,
            SavingsEntryType::Withdrawal => Direction::Decrease,
        }
    }

    fn partition(&self) -> Partition {
        Partition::Pool
    }

    fn build(direction: Direction, partition: Partition, meta: EntryMeta) -> HazinaResult<Self> {
        pool_only(Self::KIND, partition)?;
        Ok(match direction {
            Direction::Increase => Self::deposit(meta),
            Direction::Decrease => Self::withdrawal(meta),
        })
    }
}

/// Unallocated-surplus ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnallocatedEntryType {
    Deposit,
    Withdrawal,
}

/// An entry in the unallocated-surplus ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnallocatedEntry {
    #[serde(rename = "type")]
    pub entry_type: UnallocatedEntryType,

    #[serde(flatten)]
    pub meta: EntryMeta,
}

impl UnallocatedEntry {
    pub fn deposit(meta: EntryMeta) -> Self {
        Self {
            entry_type: UnallocatedEntryType::Deposit,
            meta,
        }
    }

    pub fn withdrawal(meta: EntryMeta) -> Self {
        Self {
            entry_type: UnallocatedEntryType::Withdrawal,
            meta,
        }
    }
}

impl LedgerEntry for UnallocatedEntry {
    const KIND: LedgerKind = LedgerKind::Unallocated;

    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    fn direction(&self) -> Direction {
        match self.entry_type {
            UnallocatedEntryType::Deposit => Direction::Increase,
            UnallocatedEntryType::Withdrawal => Direction::Decrease,
        }
    }

    fn partition(&self) -> Partition {
        Partition::Pool
    }

    fn build(direction: Direction, partition: Partition, meta: EntryMeta) -> HazinaResult<Self> {
        pool_only(Self::KIND, partition)?;
        Ok(match direction {
            Direction::Increase => Self::deposit(meta),
            Direction::Decrease => Self::withdrawal(meta),
        })
    }
}

/// Chama ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChamaEntryType {
    Contribution,
    Payout,
}

/// An entry in the chama ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamaEntry {
    #[serde(rename = "type")]
    pub entry_type: ChamaEntryType,

    /// `None` is the unassigned pool
    pub chama_id: Option<ChamaId>,

    #[serde(flatten)]
    pub meta: EntryMeta,
}

impl ChamaEntry {
    pub fn contribution(chama_id: Option<ChamaId>, meta: EntryMeta) -> Self {
        Self {
            entry_type: ChamaEntryType::Contribution,
            chama_id,
            meta,
        }
    }

    pub fn payout(chama_id: Option<ChamaId>, meta: EntryMeta) -> Self {
        Self {
            entry_type: ChamaEntryType::Payout,
            chama_id,
            meta,
        }
    }
}

impl LedgerEntry for ChamaEntry {
    const KIND: LedgerKind = LedgerKind::Chama;

    fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    fn direction(&self) -> Direction {
        match self.entry_type {
            ChamaEntryType::Contribution => Direction::Increase,
            ChamaEntryType::Payout => Direction::Decrease,
        }
    }

    fn partition(&self) -> Partition {
        Partition::from_chama_id(self.chama_id)
    }

    fn build(direction: Direction, partition: Partition, meta: EntryMeta) -> HazinaResult<Self> {
        let chama_id = partition.chama_id();
        Ok(match direction {
            Direction::Increase => Self::contribution(chama_id, meta),
            Direction::Decrease => Self::payout(chama_id, meta),
        })
    }
}

/// An entry from any of the three ledgers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "ledger", rename_all = "lowercase")]
pub enum AnyEntry {
    Savings(SavingsEntry),
    Chama(ChamaEntry),
    Unallocated(UnallocatedEntry),
}

impl AnyEntry {
    pub fn kind(&self) -> LedgerKind {
        match self {
            Self::Savings(_) => LedgerKind::Savings,
            Self::Chama(_) => LedgerKind::Chama,
            Self::Unallocated(_) => LedgerKind::Unallocated,
        }
    }

    pub fn meta(&self) -> &EntryMeta {
        match self {
            Self::Savings(e) => e.meta(),
            Self::Chama(e) => e.meta(),
            Self::Unallocated(e) => e.meta(),
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::Savings(e) => e.direction(),
            Self::Chama(e) => e.direction(),
            Self::Unallocated(e) => e.direction(),
        }
    }

    pub fn partition(&self) -> Partition {
        match self {
            Self::Savings(e) => e.partition(),
            Self::Chama(e) => e.partition(),
            Self::Unallocated(e) => e.partition(),
        }
    }

    pub fn amount(&self) -> Money {
        self.meta().amount
    }

    pub fn signed_amount(&self) -> Money {
        match self.direction() {
            Direction::Increase => self.amount(),
            Direction::Decrease => -self.amount(),
        }
    }

    pub fn address(&self) -> LedgerAddress {
        LedgerAddress {
            kind: self.kind(),
            partition: self.partition(),
        }
    }
}

impl From<SavingsEntry> for AnyEntry {
    fn from(entry: SavingsEntry) -> Self {
        Self::Savings(entry)
    }
}

impl From<ChamaEntry> for AnyEntry {
    fn from(entry: ChamaEntry) -> Self {
        Self::Chama(entry)
    }
}

impl From<UnallocatedEntry> for AnyEntry {
    fn from(entry: UnallocatedEntry) -> Self {
        Self::Unallocated(entry)
    }
}
