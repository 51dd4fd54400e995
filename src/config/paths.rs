//! Path management for hazina
//!
//! ## Path Resolution Order
//!
//! 1. `HAZINA_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/hazina` or `~/.config/hazina`
//! 3. Windows: `%APPDATA%\hazina`
//!
//! Every user gets a directory under `data/users/<user id>/` holding one
//! JSON file per collection.

use std::path::PathBuf;

use crate::error::HazinaError;
use crate::models::UserId;

/// Manages all paths used by hazina
#[derive(Debug, Clone)]
pub struct HazinaPaths {
    base_dir: PathBuf,
}

impl HazinaPaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if no home or config directory can be determined.
    pub fn new() -> Result<Self, HazinaError> {
        let base_dir = match std::env::var("HAZINA_DATA_DIR") {
            Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create paths rooted at a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory (~/.config/hazina/data/)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Directory holding one subdirectory per user
    pub fn users_dir(&self) -> PathBuf {
        self.data_dir().join("users")
    }

    /// Directory for a single user's collections
    pub fn user_dir(&self, user: &UserId) -> PathBuf {
        self.users_dir().join(user.as_str())
    }

    /// JSON file backing `collection` for `user`
    pub fn collection_file(&self, user: &UserId, collection: &str) -> PathBuf {
        self.user_dir(user).join(format!("{}.json", collection))
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// Ensure the base and data directories exist
    pub fn ensure_directories(&self) -> Result<(), HazinaError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| HazinaError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.users_dir())
            .map_err(|e| HazinaError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, HazinaError> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("hazina"));
        }
    }
    let home = std::env::var("HOME")
        .map_err(|_| HazinaError::Config("HOME environment variable not set".into()))?;
    Ok(PathBuf::from(home).join(".config").join("hazina"))
}

#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, HazinaError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| HazinaError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("hazina"))
}
