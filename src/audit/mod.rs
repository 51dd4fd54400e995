//! Audit logging
//!
//! Every document create/update and every ledger append is recorded in an
//! append-only JSONL log, together with the owning user and a JSON
//! snapshot of the affected record.
//!
//! # Example
//!
//! ```rust,ignore
//! use hazina::audit::{AuditEntry, AuditLogger, EntityType};
//!
//! let logger = AuditLogger::new(paths.audit_log());
//! let entry = AuditEntry::create(&user, EntityType::Chama, chama.id.to_string(), Some(chama.name.clone()), &chama);
//! logger.log(&entry)?;
//! ```

mod diff;
mod entry;
mod logger;

pub use diff::generate_diff;
pub use entry::{AuditEntry, EntityType, Operation};
pub use logger::AuditLogger;
