//! Payment execution
//!
//! A transfer happens in two steps: `send` submits it and yields a transaction
//! hash, `confirm` waits for the chain to finalize it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent::TransactionMode;
use crate::payment::TokenAmount;

/// A token transfer the agent wants executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub recipient: String,
    pub amount: TokenAmount,
    pub chain_id: u64,
    pub mode: TransactionMode,
}

/// Why a transfer was not submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionKind {
    UserDeclined,
    InsufficientFunds,
    Other,
}

impl RejectionKind {
    /// Best-effort classification of a wallet or RPC error message
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("rejected the request")
            || lower.contains("declined")
        {
            RejectionKind::UserDeclined
        } else if lower.contains("insufficient funds")
            || lower.contains("insufficient balance")
            || lower.contains("exceeds balance")
        {
            RejectionKind::InsufficientFunds
        } else {
            RejectionKind::Other
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionKind::UserDeclined => write!(f, "user-declined"),
            RejectionKind::InsufficientFunds => write!(f, "insufficient-funds"),
            RejectionKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRejection {
    pub kind: RejectionKind,
    pub message: String,
}

impl PaymentRejection {
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: RejectionKind::classify(&message),
            message,
        }
    }
}

/// Final on-chain result of a submitted transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ConfirmationOutcome {
    Succeeded,
    Reverted,
    /// The watcher gave up before the transaction was finalized
    Failed { reason: String },
}

#[async_trait]
pub trait PaymentExecutor: Send + Sync {
    /// Submit the transfer, returning its transaction hash
    async fn send(&self, transfer: &TransferRequest) -> Result<String, PaymentRejection>;

    /// Wait for a submitted transaction to be finalized
    async fn confirm(&self, tx_hash: &str) -> ConfirmationOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rejections() {
        assert_eq!(
            RejectionKind::classify("MetaMask Tx Signature: User denied transaction signature."),
            RejectionKind::UserDeclined
        );
        assert_eq!(
            RejectionKind::classify("User rejected the request."),
            RejectionKind::UserDeclined
        );
        assert_eq!(
            RejectionKind::classify("insufficient funds for gas * price + value"),
            RejectionKind::InsufficientFunds
        );
        assert_eq!(
            RejectionKind::classify("ERC20: transfer amount exceeds balance"),
            RejectionKind::InsufficientFunds
        );
        assert_eq!(
            RejectionKind::classify("connection reset by peer"),
            RejectionKind::Other
        );
    }

    #[test]
    fn test_rejection_from_message() {
        let rejection = PaymentRejection::from_message("user rejected transaction");
        assert_eq!(rejection.kind, RejectionKind::UserDeclined);
        assert_eq!(rejection.kind.to_string(), "user-declined");
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(ConfirmationOutcome::Failed {
            reason: "timeout".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "timeout");
    }
}
