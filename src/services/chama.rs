//! Chama service
//!
//! Creates chamas and moves them through their lifecycle. Chamas are never
//! deleted; a completed chama stays listed but accepts no contributions.

use tracing::info;

use crate::error::{HazinaError, HazinaResult};
use crate::models::{Chama, ChamaId, ChamaStatus, UserId};
use crate::storage::Storage;

/// Service for chama management
pub struct ChamaService<'a> {
    storage: &'a Storage,
}

impl<'a> ChamaService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create a new active chama
    pub fn create_chama(&self, user: &UserId, name: &str, note: &str) -> HazinaResult<Chama> {
        let chama = Chama::new(name).with_note(note.trim());
        chama
            .validate()
            .map_err(|e| HazinaError::Validation(e.to_string()))?;

        self.storage.chamas.insert(user, chama.clone())?;
        self.storage.log_create(user, &chama);

        info!(user = %user, chama = %chama.id, name = %chama.name, "Created chama");
        Ok(chama)
    }

    pub fn get(&self, user: &UserId, id: ChamaId) -> HazinaResult<Option<Chama>> {
        self.storage.chamas.get(user, &id)
    }

    /// Get a chama, failing with `NotFound` when it doesn't exist
    pub fn require(&self, user: &UserId, id: ChamaId) -> HazinaResult<Chama> {
        self.get(user, id)?
            .ok_or_else(|| HazinaError::chama_not_found(id.to_string()))
    }

    /// All chamas, sorted by name
    pub fn list(&self, user: &UserId) -> HazinaResult<Vec<Chama>> {
        let mut chamas = self.storage.chamas.list(user)?;
        chamas.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(chamas)
    }

    /// Change a chama's status
    ///
    /// Active and paused switch freely, either can move to completed, and
    /// completed is terminal.
    pub fn set_status(
        &self,
        user: &UserId,
        id: ChamaId,
        status: ChamaStatus,
    ) -> HazinaResult<Chama> {
        let before = self.require(user, id)?;
        if !before.status.can_transition_to(status) {
            return Err(HazinaError::Validation(format!(
                "Chama '{}' cannot move from {} to {}",
                before.name, before.status, status
            )));
        }

        let mut after = before.clone();
        after.status = status;
        self.storage.chamas.update(user, after.clone())?;
        self.storage.log_update(user, &before, &after);

        info!(user = %user, chama = %id, status = %status, "Chama status changed");
        Ok(after)
    }

    /// Get a chama that can still receive contributions
    pub fn require_open(&self, user: &UserId, id: ChamaId) -> HazinaResult<Chama> {
        let chama = self.require(user, id)?;
        if !chama.status.accepts_contributions() {
            return Err(HazinaError::Validation(format!(
                "Chama '{}' is completed and cannot receive contributions",
                chama.name
            )));
        }
        Ok(chama)
    }
}
