//! Service layer for hazina
//!
//! The service layer provides business logic on top of the storage layer:
//! validation before any write, the ledger write protocols, migrations and
//! reconciliation.

pub mod allocation;
pub mod balance;
pub mod budget;
pub mod chama;
pub mod ledger;
pub mod migration;
pub mod reconciliation;
pub mod transaction;

pub use allocation::{parse_amount, Allocation, AllocationService};
pub use balance::{BalanceService, ConservationReport};
pub use budget::BudgetService;
pub use chama::ChamaService;
pub use ledger::LedgerService;
pub use migration::{
    ChamaCorrectionPlan, CorrectionItem, MigrationKind, MigrationReport, MigrationService,
};
pub use reconciliation::{OrphanedTransfer, ReconciliationReport, ReconciliationService};
pub use transaction::{CreatedTransaction, TransactionService};
