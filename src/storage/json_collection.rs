//! JSON-file backed collection
//!
//! Each user's documents live in `data/users/<user>/<collection>.json`.
//! Files are loaded on first access and rewritten atomically on every
//! insert or update.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::paths::HazinaPaths;
use crate::error::{HazinaError, HazinaResult};
use crate::models::UserId;

use super::collection::{Collection, Document};
use super::file_io::{read_json, write_json_atomic};

/// On-disk layout of a collection file
#[derive(Deserialize)]
struct CollectionFile<T> {
    documents: Vec<T>,
}

impl<T> Default for CollectionFile<T> {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
        }
    }
}

fn lock_error<G>(_: PoisonError<G>) -> HazinaError {
    HazinaError::Storage("Collection lock poisoned".into())
}

/// A [`Collection`] persisted as one JSON file per user
pub struct JsonCollection<T: Document> {
    paths: HazinaPaths,
    name: &'static str,
    cache: RwLock<HashMap<UserId, Vec<T>>>,
}

impl<T: Document> JsonCollection<T> {
    pub fn new(paths: HazinaPaths, name: &'static str) -> Self {
        Self {
            paths,
            name,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn load(&self, user: &UserId) -> HazinaResult<Vec<T>> {
        let file: CollectionFile<T> = read_json(self.paths.collection_file(user, self.name))?;
        Ok(file.documents)
    }

    fn save(&self, user: &UserId, documents: &[T]) -> HazinaResult<()> {
        #[derive(Serialize)]
        struct Borrowed<'a, T> {
            documents: &'a [T],
        }
        write_json_atomic(
            self.paths.collection_file(user, self.name),
            &Borrowed { documents },
        )
    }

    /// Run `f` against the user's documents, loading them on first use
    fn with_documents<R>(
        &self,
        user: &UserId,
        f: impl FnOnce(&mut Vec<T>) -> HazinaResult<R>,
    ) -> HazinaResult<R> {
        let mut cache = self.cache.write().map_err(lock_error)?;
        if !cache.contains_key(user) {
            let documents = self.load(user)?;
            cache.insert(user.clone(), documents);
        }
        match cache.get_mut(user) {
            Some(documents) => f(documents),
            None => Err(HazinaError::Storage(format!(
                "Collection {} not loaded for {}",
                self.name, user
            ))),
        }
    }

    fn read_cached<R>(&self, user: &UserId, f: impl FnOnce(&[T]) -> R) -> HazinaResult<Option<R>> {
        let cache = self.cache.read().map_err(lock_error)?;
        Ok(cache.get(user).map(|documents| f(documents)))
    }
}

impl<T: Document> Collection<T> for JsonCollection<T> {
    fn get(&self, user: &UserId, id: &T::Id) -> HazinaResult<Option<T>> {
        let find = |docs: &[T]| docs.iter().find(|d| d.doc_id() == *id).cloned();
        if let Some(found) = self.read_cached(user, find)? {
            return Ok(found);
        }
        self.with_documents(user, |docs| Ok(find(docs)))
    }

    fn list(&self, user: &UserId) -> HazinaResult<Vec<T>> {
        if let Some(all) = self.read_cached(user, |docs| docs.to_vec())? {
            return Ok(all);
        }
        self.with_documents(user, |docs| Ok(docs.clone()))
    }

    fn insert(&self, user: &UserId, doc: T) -> HazinaResult<()> {
        self.with_documents(user, |docs| {
            let id = doc.doc_id();
            if docs.iter().any(|d| d.doc_id() == id) {
                return Err(HazinaError::Duplicate {
                    entity_type: T::ENTITY.as_str(),
                    identifier: id.to_string(),
                });
            }
            docs.push(doc);
            if let Err(e) = self.save(user, docs) {
                docs.pop();
                return Err(e);
            }
            Ok(())
        })
    }

    fn update(&self, user: &UserId, doc: T) -> HazinaResult<()> {
        self.with_documents(user, |docs| {
            let id = doc.doc_id();
            let slot = docs
                .iter_mut()
                .find(|d| d.doc_id() == id)
                .ok_or_else(|| HazinaError::NotFound {
                    entity_type: T::ENTITY.as_str(),
                    identifier: id.to_string(),
                })?;
            let previous = std::mem::replace(slot, doc);
            if let Err(e) = self.save(user, docs) {
                if let Some(slot) = docs.iter_mut().find(|d| d.doc_id() == id) {
                    *slot = previous;
                }
                return Err(e);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chama, ChamaStatus};
    use tempfile::TempDir;

    fn setup() -> (TempDir, JsonCollection<Chama>) {
        let temp_dir = TempDir::new().unwrap();
        let paths = HazinaPaths::with_base_dir(temp_dir.path().to_path_buf());
        (temp_dir, JsonCollection::new(paths, "chamas"))
    }

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let (_temp, chamas) = setup();
        let chama = Chama::new("Family Circle");

        chamas.insert(&alice(), chama.clone()).unwrap();

        assert_eq!(chamas.get(&alice(), &chama.id).unwrap(), Some(chama));
        assert_eq!(chamas.list(&alice()).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let (_temp, chamas) = setup();
        let chama = Chama::new("Family Circle");

        chamas.insert(&alice(), chama.clone()).unwrap();
        let err = chamas.insert(&alice(), chama).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(chamas.list(&alice()).unwrap().len(), 1);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let (_temp, chamas) = setup();
        let err = chamas.update(&alice(), Chama::new("Ghost")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_replaces_document() {
        let (_temp, chamas) = setup();
        let mut chama = Chama::new("Family Circle");
        chamas.insert(&alice(), chama.clone()).unwrap();

        chama.status = ChamaStatus::Paused;
        chamas.update(&alice(), chama.clone()).unwrap();

        let loaded = chamas.get(&alice(), &chama.id).unwrap().unwrap();
        assert_eq!(loaded.status, ChamaStatus::Paused);
    }

    #[test]
    fn test_users_are_isolated() {
        let (_temp, chamas) = setup();
        chamas.insert(&alice(), Chama::new("Family Circle")).unwrap();

        let bob = UserId::new("bob").unwrap();
        assert!(chamas.list(&bob).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HazinaPaths::with_base_dir(temp_dir.path().to_path_buf());

        let first: JsonCollection<Chama> = JsonCollection::new(paths.clone(), "chamas");
        let chama = Chama::new("Family Circle");
        first.insert(&alice(), chama.clone()).unwrap();

        let second: JsonCollection<Chama> = JsonCollection::new(paths.clone(), "chamas");
        assert_eq!(second.get(&alice(), &chama.id).unwrap(), Some(chama));
        assert!(paths.collection_file(&alice(), "chamas").exists());
    }

    #[test]
    fn test_list_keeps_insertion_order() {
        let (_temp, chamas) = setup();
        let names = ["Zeta", "Alpha", "Mid"];
        for name in names {
            chamas.insert(&alice(), Chama::new(name)).unwrap();
        }

        let listed: Vec<_> = chamas
            .list(&alice())
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(listed, names);
    }
}
