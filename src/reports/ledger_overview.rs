//! Ledger Overview Report
//!
//! Current balances of the savings and unallocated ledgers, the chama pool
//! and every chama. Inconsistencies found by the reconciliation scan are
//! listed as warnings rather than failing the report.

use crate::error::HazinaResult;
use crate::models::{Chama, LedgerKind, Money, Partition, UserId};
use crate::services::{BalanceService, ChamaService, ReconciliationService};
use crate::storage::Storage;

/// Balance of one chama
#[derive(Debug, Clone, PartialEq)]
pub struct ChamaBalanceRow {
    pub chama: Chama,
    pub balance: Money,
}

/// Ledger Overview Report
#[derive(Debug, Clone)]
pub struct LedgerOverviewReport {
    pub savings: Money,
    pub unallocated: Money,
    /// Chama money not yet assigned to a chama
    pub chama_pool: Money,
    /// Sorted by chama name
    pub chamas: Vec<ChamaBalanceRow>,
    /// Pool plus every chama
    pub chama_total: Money,
    pub warnings: Vec<String>,
    pub currency: String,
}

impl LedgerOverviewReport {
    pub fn generate(storage: &Storage, user: &UserId) -> HazinaResult<Self> {
        let balances = BalanceService::new(storage);
        let chama_partitions = balances.partition_balances(user, LedgerKind::Chama)?;

        let chamas = ChamaService::new(storage)
            .list(user)?
            .into_iter()
            .map(|chama| {
                let balance = chama_partitions
                    .get(&Partition::Chama(chama.id))
                    .copied()
                    .unwrap_or_default();
                ChamaBalanceRow { chama, balance }
            })
            .collect();

        let warnings = ReconciliationService::new(storage).scan(user)?.warnings();

        Ok(Self {
            savings: balances.get_balance(user, LedgerKind::Savings, None)?,
            unallocated: balances.get_balance(user, LedgerKind::Unallocated, None)?,
            chama_pool: chama_partitions
                .get(&Partition::Pool)
                .copied()
                .unwrap_or_default(),
            chamas,
            chama_total: chama_partitions.values().copied().sum(),
            warnings,
            currency: storage.settings().currency_symbol.clone(),
        })
    }

    pub fn is_consistent(&self) -> bool {
        self.warnings.is_empty()
    }

    fn money(&self, amount: Money) -> String {
        amount.format_with_symbol(&self.currency)
    }

    /// Format the report for terminal display
    pub fn format_terminal(&self) -> String {
        let mut output = String::new();

        output.push_str("Ledger Overview\n");
        output.push_str(&"=".repeat(60));
        output.push('\n');
        output.push_str(&format!("{:<36} {:>20}\n", "Savings", self.money(self.savings)));
        output.push_str(&format!(
            "{:<36} {:>20}\n",
            "Unallocated",
            self.money(self.unallocated)
        ));
        output.push_str(&format!(
            "{:<36} {:>20}\n",
            "Chama Pool",
            self.money(self.chama_pool)
        ));

        for row in &self.chamas {
            output.push_str(&format!(
                "  {:<34} {:>20}\n",
                format!("{} ({})", row.chama.name, row.chama.status),
                self.money(row.balance)
            ));
        }

        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!(
            "{:<36} {:>20}\n",
            "Chama Total",
            self.money(self.chama_total)
        ));

        if !self.warnings.is_empty() {
            output.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                output.push_str(&format!("  ! {}\n", warning));
            }
        }

        output
    }
}
