//! Reports module for hazina
//!
//! Read-only views over budgets, transactions and ledgers: the monthly
//! analysis, the summary across months, spending charts and the ledger
//! overview.

pub mod ledger_overview;
pub mod monthly_analysis;
pub mod monthly_summary;
pub mod spending;

pub use ledger_overview::{ChamaBalanceRow, LedgerOverviewReport};
pub use monthly_analysis::{CategoryAnalysisRow, MonthlyAnalysisReport, ProgressBreakdown};
pub use monthly_summary::{MonthSummaryRow, MonthlySummaryReport};
pub use spending::{CategoryTotal, DailySpend, PaymentMethodCount, SpendingReport};
