//! Chama model
//!
//! A chama is a rotating group savings fund. Its balance is derived from the
//! chama ledger; the document only carries identity and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::ChamaId;

/// Lifecycle status of a chama
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChamaStatus {
    #[default]
    Active,
    Paused,
    Completed,
}

impl ChamaStatus {
    /// Check whether moving to `next` is allowed
    ///
    /// Active and paused switch freely; completed is terminal.
    pub fn can_transition_to(&self, next: ChamaStatus) -> bool {
        match (self, next) {
            (Self::Completed, _) => false,
            (a, b) if *a == b => false,
            _ => true,
        }
    }

    pub fn accepts_contributions(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for ChamaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Paused => write!(f, "Paused"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

/// A group savings fund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chama {
    pub id: ChamaId,

    pub name: String,

    #[serde(default)]
    pub status: ChamaStatus,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub note: String,
}

impl Chama {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ChamaId::new(),
            name: name.into().trim().to_string(),
            status: ChamaStatus::Active,
            created_at: Utc::now(),
            note: String::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn validate(&self) -> Result<(), ChamaValidationError> {
        if self.name.trim().is_empty() {
            return Err(ChamaValidationError::EmptyName);
        }
        Ok(())
    }
}

impl fmt::Display for Chama {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.status)
    }
}

/// Validation errors for chamas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChamaValidationError {
    EmptyName,
}

impl fmt::Display for ChamaValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Chama name cannot be empty"),
        }
    }
}

impl std::error::Error for ChamaValidationError {}
