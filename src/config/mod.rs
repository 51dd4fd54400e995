//! Configuration for hazina
//!
//! - XDG-compliant path resolution with per-user data directories
//! - Settings persistence (category names with ledger semantics, report tuning)

pub mod paths;
pub mod settings;

pub use paths::HazinaPaths;
pub use settings::Settings;
