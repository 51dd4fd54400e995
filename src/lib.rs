//! Hazina - household budget ledgers
//!
//! This library keeps monthly budgets, the transactions booked against them,
//! and three append-only ledgers derived from them: savings, chama
//! contributions and unallocated surplus. Balances are always computed from
//! ledger entries, never stored.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Path management and settings
//! - `error`: Custom error types
//! - `models`: Core data models (budgets, transactions, chamas, ledger entries)
//! - `storage`: Collection interface and JSON file storage
//! - `audit`: Audit logging system
//! - `services`: Business logic, ledger write protocols, migrations
//! - `reports`: Read-only analysis
//!
//! # Example
//!
//! ```rust,ignore
//! use hazina::config::HazinaPaths;
//! use hazina::services::BalanceService;
//! use hazina::storage::Storage;
//!
//! let storage = Storage::open(HazinaPaths::new()?)?;
//! let balance = BalanceService::new(&storage).get_balance(&user, LedgerKind::Savings, None)?;
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod models;
pub mod reports;
pub mod services;
pub mod storage;

pub use error::{HazinaError, HazinaResult};
