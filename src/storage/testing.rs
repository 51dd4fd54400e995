//! Test doubles for the collection interface

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{HazinaError, HazinaResult};
use crate::models::UserId;

use super::collection::{Collection, Document};

/// Collection wrapper that starts failing writes on demand
pub struct FailingCollection<T: Document> {
    inner: Arc<dyn Collection<T>>,
    inserts_left: AtomicUsize,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
}

impl<T: Document> FailingCollection<T> {
    pub fn new(inner: Arc<dyn Collection<T>>) -> Self {
        Self {
            inner,
            inserts_left: AtomicUsize::new(0),
            fail_inserts: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
        }
    }

    /// Let `n` more inserts through, then fail every insert
    pub fn fail_inserts_after(&self, n: usize) {
        self.inserts_left.store(n, Ordering::SeqCst);
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_inserts.store(false, Ordering::SeqCst);
        self.fail_updates.store(false, Ordering::SeqCst);
    }

    fn simulated() -> HazinaError {
        HazinaError::Storage("simulated write failure".into())
    }
}

impl<T: Document> Collection<T> for FailingCollection<T> {
    fn get(&self, user: &UserId, id: &T::Id) -> HazinaResult<Option<T>> {
        self.inner.get(user, id)
    }

    fn list(&self, user: &UserId) -> HazinaResult<Vec<T>> {
        self.inner.list(user)
    }

    fn insert(&self, user: &UserId, doc: T) -> HazinaResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            let allowed = self
                .inserts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !allowed {
                return Err(Self::simulated());
            }
        }
        self.inner.insert(user, doc)
    }

    fn update(&self, user: &UserId, doc: T) -> HazinaResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::simulated());
        }
        self.inner.update(user, doc)
    }
}

/// JSON-backed storage in a fresh temp directory
pub fn temp_storage() -> (tempfile::TempDir, super::Storage) {
    let temp_dir = tempfile::TempDir::new().expect("temp dir");
    let paths = crate::config::HazinaPaths::with_base_dir(temp_dir.path().to_path_buf());
    let storage = super::Storage::open(paths).expect("open storage");
    (temp_dir, storage)
}

/// JSON-backed storage with fault injection on selected collections
pub struct FlakyStorage {
    pub storage: super::Storage,
    pub chama_ledger: Arc<FailingCollection<crate::models::ChamaEntry>>,
    pub savings: Arc<FailingCollection<crate::models::SavingsEntry>>,
    pub transactions: Arc<FailingCollection<crate::models::Transaction>>,
    _temp_dir: tempfile::TempDir,
}

pub fn flaky_storage() -> FlakyStorage {
    let temp_dir = tempfile::TempDir::new().expect("temp dir");
    let paths = crate::config::HazinaPaths::with_base_dir(temp_dir.path().to_path_buf());
    let mut collections = super::StorageCollections::json(&paths);

    let chama_ledger = Arc::new(FailingCollection::new(collections.chama_ledger.clone()));
    let savings = Arc::new(FailingCollection::new(collections.savings.clone()));
    let transactions = Arc::new(FailingCollection::new(collections.transactions.clone()));
    collections.chama_ledger = chama_ledger.clone();
    collections.savings = savings.clone();
    collections.transactions = transactions.clone();

    FlakyStorage {
        storage: super::Storage::from_collections(collections, crate::config::Settings::default()),
        chama_ledger,
        savings,
        transactions,
        _temp_dir: temp_dir,
    }
}

pub fn test_user() -> UserId {
    UserId::new("test-user").expect("valid user id")
}
