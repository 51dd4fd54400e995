//! Storage layer for hazina
//!
//! Documents live behind the [`Collection`] interface, one collection per
//! document kind, partitioned by user. The default implementation keeps one
//! JSON file per user and collection with atomic writes. Ledger collections
//! are wrapped in an append-only [`LedgerRepository`].

pub mod collection;
pub mod file_io;
pub mod json_collection;
pub mod ledger;

#[cfg(test)]
pub(crate) mod testing;

pub use collection::{Collection, Document};
pub use file_io::{read_json, write_json_atomic};
pub use json_collection::JsonCollection;
pub use ledger::LedgerRepository;

use std::sync::Arc;

use tracing::warn;

use crate::audit::{generate_diff, AuditEntry, AuditLogger};
use crate::config::paths::HazinaPaths;
use crate::config::settings::Settings;
use crate::error::HazinaResult;
use crate::models::{
    AnyEntry, Budget, Chama, ChamaEntry, Direction, EntryId, EntryMeta, LedgerAddress,
    LedgerEntry, LedgerKind, SavingsEntry, Transaction, UnallocatedEntry, UserId,
};

/// The six collections backing a [`Storage`]
pub struct StorageCollections {
    pub budgets: Arc<dyn Collection<Budget>>,
    pub transactions: Arc<dyn Collection<Transaction>>,
    pub chamas: Arc<dyn Collection<Chama>>,
    pub savings: Arc<dyn Collection<SavingsEntry>>,
    pub chama_ledger: Arc<dyn Collection<ChamaEntry>>,
    pub unallocated: Arc<dyn Collection<UnallocatedEntry>>,
}

impl StorageCollections {
    /// JSON-file collections under the data directory
    pub fn json(paths: &HazinaPaths) -> Self {
        Self {
            budgets: Arc::new(JsonCollection::<Budget>::new(paths.clone(), "budgets")),
            transactions: Arc::new(JsonCollection::<Transaction>::new(
                paths.clone(),
                "transactions",
            )),
            chamas: Arc::new(JsonCollection::<Chama>::new(paths.clone(), "chamas")),
            savings: Arc::new(JsonCollection::<SavingsEntry>::new(
                paths.clone(),
                LedgerKind::Savings.collection_name(),
            )),
            chama_ledger: Arc::new(JsonCollection::<ChamaEntry>::new(
                paths.clone(),
                LedgerKind::Chama.collection_name(),
            )),
            unallocated: Arc::new(JsonCollection::<UnallocatedEntry>::new(
                paths.clone(),
                LedgerKind::Unallocated.collection_name(),
            )),
        }
    }
}

/// Storage coordinator bundling every collection, settings and the audit log
pub struct Storage {
    settings: Settings,
    pub budgets: Arc<dyn Collection<Budget>>,
    pub transactions: Arc<dyn Collection<Transaction>>,
    pub chamas: Arc<dyn Collection<Chama>>,
    pub savings: LedgerRepository<SavingsEntry>,
    pub chama_ledger: LedgerRepository<ChamaEntry>,
    pub unallocated: LedgerRepository<UnallocatedEntry>,
    audit: Option<AuditLogger>,
}

impl Storage {
    /// Open JSON-backed storage rooted at `paths`
    pub fn open(paths: HazinaPaths) -> HazinaResult<Self> {
        paths.ensure_directories()?;
        let settings = Settings::load_or_create(&paths)?;
        let storage = Self::from_collections(StorageCollections::json(&paths), settings)
            .with_audit(AuditLogger::new(paths.audit_log()));
        Ok(storage)
    }

    /// Build storage over any collection implementation
    pub fn from_collections(collections: StorageCollections, settings: Settings) -> Self {
        Self {
            settings,
            budgets: collections.budgets,
            transactions: collections.transactions,
            chamas: collections.chamas,
            savings: LedgerRepository::new(collections.savings),
            chama_ledger: LedgerRepository::new(collections.chama_ledger),
            unallocated: LedgerRepository::new(collections.unallocated),
            audit: None,
        }
    }

    pub fn with_audit(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(logger);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn audit(&self) -> Option<&AuditLogger> {
        self.audit.as_ref()
    }

    /// Record a document creation in the audit log
    pub fn log_create<T: Document>(&self, user: &UserId, doc: &T) {
        self.record(|| {
            AuditEntry::create(
                user,
                T::ENTITY,
                doc.doc_id().to_string(),
                doc.audit_label(),
                doc,
            )
        });
    }

    /// Record a document update with a field diff
    pub fn log_update<T: Document>(&self, user: &UserId, before: &T, after: &T) {
        self.record(|| {
            let diff = match (serde_json::to_value(before), serde_json::to_value(after)) {
                (Ok(b), Ok(a)) => generate_diff(&b, &a),
                _ => None,
            };
            AuditEntry::update(
                user,
                T::ENTITY,
                after.doc_id().to_string(),
                after.audit_label(),
                before,
                after,
                diff,
            )
        });
    }

    /// Record a ledger append
    pub fn log_append<E: Document>(&self, user: &UserId, entry: &E) {
        self.record(|| {
            AuditEntry::append(
                user,
                E::ENTITY,
                entry.doc_id().to_string(),
                entry.audit_label(),
                entry,
            )
        });
    }

    /// The audit trail never fails a write that already happened
    fn record(&self, build: impl FnOnce() -> AuditEntry) {
        if let Some(logger) = &self.audit {
            let entry = build();
            if let Err(e) = logger.log(&entry) {
                warn!(
                    entity_type = %entry.entity_type,
                    entity_id = %entry.entity_id,
                    error = %e,
                    "Failed to write audit entry"
                );
            }
        }
    }

    /// Append to a ledger and record the append
    pub fn append<E>(&self, repo: &LedgerRepository<E>, user: &UserId, entry: E) -> HazinaResult<E>
    where
        E: LedgerEntry + Document<Id = EntryId>,
    {
        let entry = repo.append(user, entry)?;
        self.log_append(user, &entry);
        Ok(entry)
    }

    /// Append an entry to the ledger named by `address`
    pub fn append_entry(
        &self,
        user: &UserId,
        address: LedgerAddress,
        direction: Direction,
        meta: EntryMeta,
    ) -> HazinaResult<AnyEntry> {
        address.validate()?;
        match address.kind {
            LedgerKind::Savings => {
                let entry = SavingsEntry::build(direction, address.partition, meta)?;
                self.append(&self.savings, user, entry).map(AnyEntry::from)
            }
            LedgerKind::Chama => {
                let entry = ChamaEntry::build(direction, address.partition, meta)?;
                self.append(&self.chama_ledger, user, entry).map(AnyEntry::from)
            }
            LedgerKind::Unallocated => {
                let entry = UnallocatedEntry::build(direction, address.partition, meta)?;
                self.append(&self.unallocated, user, entry).map(AnyEntry::from)
            }
        }
    }

    /// Every entry of one ledger in append order
    pub fn entries(&self, user: &UserId, kind: LedgerKind) -> HazinaResult<Vec<AnyEntry>> {
        Ok(match kind {
            LedgerKind::Savings => into_any(self.savings.list(user)?),
            LedgerKind::Chama => into_any(self.chama_ledger.list(user)?),
            LedgerKind::Unallocated => into_any(self.unallocated.list(user)?),
        })
    }
}

fn into_any<E: Into<AnyEntry>>(entries: Vec<E>) -> Vec<AnyEntry> {
    entries.into_iter().map(Into::into).collect()
}
