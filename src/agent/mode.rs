//! Transaction-Mode Gate
//!
//! `real` when the payer holds a positive balance on the designated network,
//! `simulation` otherwise. The mode is always recomputed from the latest
//! wallet snapshot; the gate only remembers the last value it reported so a
//! change can be noted in the activity log.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use crate::agent::{ActivityKind, ActivityLog};
use crate::wallet::WalletSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    Real,
    Simulation,
}

impl TransactionMode {
    pub fn derive(wallet: &WalletSnapshot, designated_chain_id: u64) -> Self {
        let funded = wallet.balance.map(|b| !b.is_zero()).unwrap_or(false);
        if funded && wallet.is_on_chain(designated_chain_id) {
            TransactionMode::Real
        } else {
            TransactionMode::Simulation
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, TransactionMode::Real)
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionMode::Real => write!(f, "real"),
            TransactionMode::Simulation => write!(f, "simulation"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModeGate {
    designated_chain_id: u64,
    last_reported: Option<TransactionMode>,
}

impl ModeGate {
    pub fn new(designated_chain_id: u64) -> Self {
        Self {
            designated_chain_id,
            last_reported: None,
        }
    }

    pub fn designated_chain_id(&self) -> u64 {
        self.designated_chain_id
    }

    pub fn mode_for(&self, wallet: &WalletSnapshot) -> TransactionMode {
        TransactionMode::derive(wallet, self.designated_chain_id)
    }

    /// Recompute the mode for a new snapshot, logging a note when it changed.
    /// Never touches agent state.
    pub fn observe(&mut self, wallet: &WalletSnapshot, log: &mut ActivityLog) -> TransactionMode {
        let mode = self.mode_for(wallet);
        if self.last_reported != Some(mode) {
            let message = match mode {
                TransactionMode::Real => "Funded wallet on the designated network - real transactions enabled",
                TransactionMode::Simulation => "Transaction mode: simulation",
            };
            log.append(
                ActivityKind::Network,
                message,
                Some(json!({
                    "mode": mode,
                    "chainId": wallet.chain_id,
                    "balance": wallet.balance,
                })),
            );
            self.last_reported = Some(mode);
        }
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::TokenAmount;

    const ARC: u64 = 5042002;

    fn snapshot(balance: &str, chain_id: u64) -> WalletSnapshot {
        WalletSnapshot::connected("0xpayer", chain_id, TokenAmount::parse(balance).unwrap())
    }

    #[test]
    fn test_real_requires_balance_and_network() {
        assert_eq!(
            TransactionMode::derive(&snapshot("1.00", ARC), ARC),
            TransactionMode::Real
        );
        assert_eq!(
            TransactionMode::derive(&snapshot("0.00", ARC), ARC),
            TransactionMode::Simulation
        );
        assert_eq!(
            TransactionMode::derive(&snapshot("1.00", 1), ARC),
            TransactionMode::Simulation
        );
        assert_eq!(
            TransactionMode::derive(&WalletSnapshot::disconnected(), ARC),
            TransactionMode::Simulation
        );
    }

    #[test]
    fn test_observe_logs_only_changes() {
        let mut gate = ModeGate::new(ARC);
        let mut log = ActivityLog::default();

        assert_eq!(gate.observe(&snapshot("0.00", ARC), &mut log), TransactionMode::Simulation);
        assert_eq!(log.len(), 1);

        // Balance changed, mode did not
        gate.observe(&WalletSnapshot::disconnected(), &mut log);
        assert_eq!(log.len(), 1);

        assert!(gate.observe(&snapshot("3.00", ARC), &mut log).is_real());
        assert_eq!(log.len(), 2);
        assert_eq!(log.latest().unwrap().kind, ActivityKind::Network);
        assert_eq!(log.latest().unwrap().details.as_ref().unwrap()["mode"], "real");
    }
}
