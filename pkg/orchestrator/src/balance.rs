use crate::wallet::Wallet;
use primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Named classes of balance findings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViolationClass {
    BalanceInconsistent,
    WrongAmountReceived,
}

/// One recorded balance finding. Diagnostic only — violations never halt
/// execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub class: ViolationClass,
    pub wallet: Address,
    pub detail: String,
}

/// Per-wallet line of the final balance report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub address: Address,
    pub balance: u64,
    pub utxo_total: u64,
    pub utxo_count: usize,
    pub consistent: bool,
}

/// Aggregated end-of-run balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub pass: bool,
    pub wallets: Vec<WalletBalance>,
}

impl BalanceReport {
    pub fn wallet(&self, address: Address) -> Option<&WalletBalance> {
        self.wallets.iter().find(|wallet| wallet.address == address)
    }
}

/// Cross-checks tracked wallet balances against their UTXO sets.
pub struct BalanceVerifier;

impl BalanceVerifier {
    /// Post-confirmation check for one edge: both parties' tracked balances
    /// must equal their UTXO sums, and the receiver's newest note must carry
    /// exactly the transfer amount.
    pub fn check_edge(sender: &Wallet, receiver: &Wallet, amount: u64) -> Vec<Violation> {
        let mut violations = Vec::new();

        for wallet in [sender, receiver] {
            if wallet.balance() != wallet.utxo_total() {
                violations.push(Violation {
                    class: ViolationClass::BalanceInconsistent,
                    wallet: wallet.address(),
                    detail: format!(
                        "tracked balance {} != unspent total {}",
                        wallet.balance(),
                        wallet.utxo_total()
                    ),
                });
            }
        }

        match receiver.newest_utxo() {
            Some(utxo) if utxo.amount() == amount => {}
            Some(utxo) => violations.push(Violation {
                class: ViolationClass::WrongAmountReceived,
                wallet: receiver.address(),
                detail: format!("newest note carries {}, expected {amount}", utxo.amount()),
            }),
            None => violations.push(Violation {
                class: ViolationClass::WrongAmountReceived,
                wallet: receiver.address(),
                detail: format!("no note received, expected {amount}"),
            }),
        }

        for violation in &violations {
            warn!(
                class = %violation.class,
                wallet = %violation.wallet.prefix(),
                detail = %violation.detail,
                "balance violation"
            );
        }

        violations
    }

    /// Final pass over every wallet.
    pub fn final_report<'a>(wallets: impl IntoIterator<Item = &'a Wallet>) -> BalanceReport {
        let wallets: Vec<WalletBalance> = wallets
            .into_iter()
            .map(|wallet| WalletBalance {
                address: wallet.address(),
                balance: wallet.balance(),
                utxo_total: wallet.utxo_total(),
                utxo_count: wallet.utxos().len(),
                consistent: wallet.balance() == wallet.utxo_total(),
            })
            .collect();

        BalanceReport {
            pass: wallets.iter().all(|wallet| wallet.consistent),
            wallets,
        }
    }
}
