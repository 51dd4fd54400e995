//! Settings for hazina
//!
//! Category names that carry ledger semantics, display currency and report
//! tuning. Every field has a default so partial config files load.

use serde::{Deserialize, Serialize};

use super::paths::HazinaPaths;
use crate::error::HazinaError;
use crate::models::money::DEFAULT_CURRENCY;
use crate::models::{BudgetMonth, CategoryTag};

/// User-tunable settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default = "default_currency")]
    pub currency_symbol: String,

    /// Transactions in this category trigger a savings deposit
    #[serde(default = "default_savings_category")]
    pub savings_category: String,

    /// Inflow category subtracted from net outflow
    #[serde(default = "default_recovered_category")]
    pub recovered_category: String,

    #[serde(default = "default_lost_category")]
    pub lost_category: String,

    /// Category for excess booked by the chama correction
    #[serde(default = "default_excess_category")]
    pub excess_category: String,

    /// Month receiving excess transactions from the chama correction
    #[serde(default = "default_correction_month")]
    pub correction_budget_month: BudgetMonth,

    /// Trailing window for the daily spend report
    #[serde(default = "default_daily_window")]
    pub daily_spend_window_days: u32,

    #[serde(default = "default_top_limit")]
    pub top_category_limit: usize,
}

fn default_schema_version() -> u32 {
    1
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_savings_category() -> String {
    "Savings".to_string()
}

fn default_recovered_category() -> String {
    "Money Recovered".to_string()
}

fn default_lost_category() -> String {
    "Money Lost".to_string()
}

fn default_excess_category() -> String {
    "Miscellaneous".to_string()
}

fn default_correction_month() -> BudgetMonth {
    BudgetMonth::of(2026, 1)
}

fn default_daily_window() -> u32 {
    30
}

fn default_top_limit() -> usize {
    6
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            currency_symbol: default_currency(),
            savings_category: default_savings_category(),
            recovered_category: default_recovered_category(),
            lost_category: default_lost_category(),
            excess_category: default_excess_category(),
            correction_budget_month: default_correction_month(),
            daily_spend_window_days: default_daily_window(),
            top_category_limit: default_top_limit(),
        }
    }
}

impl Settings {
    /// Tag for a category name that has no stored tag
    ///
    /// The configured savings, recovered and lost names match exactly
    /// (ignoring case); anything else falls back to [`CategoryTag::infer`].
    pub fn tag_for_category(&self, name: &str) -> CategoryTag {
        let name = name.trim();
        if name.eq_ignore_ascii_case(&self.savings_category) {
            CategoryTag::Savings
        } else if name.eq_ignore_ascii_case(&self.recovered_category) {
            CategoryTag::Recovered
        } else if name.eq_ignore_ascii_case(&self.lost_category) {
            CategoryTag::Lost
        } else {
            CategoryTag::infer(name)
        }
    }

    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &HazinaPaths) -> Result<Self, HazinaError> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| HazinaError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| HazinaError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &HazinaPaths) -> Result<(), HazinaError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| HazinaError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| HazinaError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
