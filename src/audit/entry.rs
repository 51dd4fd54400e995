//! Audit entry data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{LedgerKind, UserId};

/// Types of operations that can be audited
///
/// Documents are created and updated; ledger entries are only appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Append,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Append => write!(f, "APPEND"),
        }
    }
}

/// Types of entities that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Budget,
    Transaction,
    Chama,
    SavingsEntry,
    ChamaEntry,
    UnallocatedEntry,
}

impl EntityType {
    /// Entity type of entries in the given ledger
    pub const fn for_ledger(kind: LedgerKind) -> Self {
        match kind {
            LedgerKind::Savings => EntityType::SavingsEntry,
            LedgerKind::Chama => EntityType::ChamaEntry,
            LedgerKind::Unallocated => EntityType::UnallocatedEntry,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Budget => "Budget",
            EntityType::Transaction => "Transaction",
            EntityType::Chama => "Chama",
            EntityType::SavingsEntry => "SavingsEntry",
            EntityType::ChamaEntry => "ChamaEntry",
            EntityType::UnallocatedEntry => "UnallocatedEntry",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    /// Owner of the affected document
    pub user: UserId,

    pub operation: Operation,

    pub entity_type: EntityType,

    pub entity_id: String,

    /// Human-readable label (chama name, budget month, entry note)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_summary: Option<String>,
}

impl AuditEntry {
    fn snapshot(
        user: &UserId,
        operation: Operation,
        entity_type: EntityType,
        entity_id: String,
        entity_name: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user: user.clone(),
            operation,
            entity_type,
            entity_id,
            entity_name,
            before: None,
            after: None,
            diff_summary: None,
        }
    }

    /// Record a new document
    pub fn create<T: Serialize>(
        user: &UserId,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        entity_name: Option<String>,
        entity: &T,
    ) -> Self {
        let mut entry = Self::snapshot(
            user,
            Operation::Create,
            entity_type,
            entity_id.into(),
            entity_name,
        );
        entry.after = serde_json::to_value(entity).ok();
        entry
    }

    /// Record a document update with before/after values
    pub fn update<T: Serialize>(
        user: &UserId,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        entity_name: Option<String>,
        before: &T,
        after: &T,
        diff_summary: Option<String>,
    ) -> Self {
        let mut entry = Self::snapshot(
            user,
            Operation::Update,
            entity_type,
            entity_id.into(),
            entity_name,
        );
        entry.before = serde_json::to_value(before).ok();
        entry.after = serde_json::to_value(after).ok();
        entry.diff_summary = diff_summary;
        entry
    }

    /// Record a ledger append
    pub fn append<T: Serialize>(
        user: &UserId,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        entity_name: Option<String>,
        entry_value: &T,
    ) -> Self {
        let mut entry = Self::snapshot(
            user,
            Operation::Append,
            entity_type,
            entity_id.into(),
            entity_name,
        );
        entry.after = serde_json::to_value(entry_value).ok();
        entry
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.user,
            self.operation,
            self.entity_type,
            self.entity_id
        );

        if let Some(name) = &self.entity_name {
            output.push_str(&format!(" ({})", name));
        }

        if let Some(diff) = &self.diff_summary {
            output.push_str(&format!("\n  Changes: {}", diff));
        }

        output
    }
}
