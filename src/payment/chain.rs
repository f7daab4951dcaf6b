// On-chain USDC wallet (Arc Testnet)
//
// A key-backed signer that reads the ERC-20 balance, submits `transfer` calls
// and polls for receipts. Used in place of the simulated wallet when a private
// key is configured.

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::utils::to_checksum;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::NetworkConfig;
use crate::payment::{
    ConfirmationOutcome, PaymentExecutor, PaymentRejection, RejectionKind, TokenAmount,
    TransferRequest,
};
use crate::types::{AppError, AppResult};
use crate::utils::{with_retry, RetryPolicy};
use crate::wallet::{BalanceOracle, WalletControl, WalletSnapshot};

abigen!(
    Erc20Token,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function transfer(address to, uint256 amount) external returns (bool)
    ]"#
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct ChainWallet {
    client: Arc<SignerClient>,
    token: Erc20Token<SignerClient>,
    chain_id: u64,
    receipt_policy: RetryPolicy,
    connected: AtomicBool,
}

impl ChainWallet {
    pub fn new(
        network: &NetworkConfig,
        private_key: &str,
        receipt_policy: RetryPolicy,
    ) -> AppResult<Self> {
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str())
            .map_err(|e| AppError::Config(format!("invalid RPC url {}: {}", network.rpc_url, e)))?;
        let signer = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| AppError::Config(format!("invalid private key: {}", e)))?
            .with_chain_id(network.chain_id);
        let token_address: Address = network.usdc_address.parse().map_err(|e| {
            AppError::Config(format!("invalid USDC address {}: {}", network.usdc_address, e))
        })?;

        let client = Arc::new(SignerMiddleware::new(provider, signer));
        let token = Erc20Token::new(token_address, client.clone());

        Ok(Self {
            client,
            token,
            chain_id: network.chain_id,
            receipt_policy,
            connected: AtomicBool::new(false),
        })
    }

    pub fn address(&self) -> String {
        to_checksum(&self.client.address(), None)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceOracle for ChainWallet {
    async fn read(&self) -> AppResult<WalletSnapshot> {
        if !self.is_connected() {
            return Ok(WalletSnapshot::disconnected());
        }

        let chain_id = self
            .client
            .get_chainid()
            .await
            .map_err(|e| AppError::Chain(format!("chain id lookup failed: {}", e)))?;
        let balance = self
            .token
            .balance_of(self.client.address())
            .call()
            .await
            .map_err(|e| AppError::Chain(format!("balanceOf failed: {}", e)))?;

        Ok(WalletSnapshot::connected(
            self.address(),
            chain_id.as_u64(),
            TokenAmount::from_base_units(balance),
        ))
    }
}

#[async_trait]
impl WalletControl for ChainWallet {
    async fn connect(&self) -> AppResult<()> {
        let remote = self
            .client
            .get_chainid()
            .await
            .map_err(|e| AppError::Wallet(format!("RPC endpoint unreachable: {}", e)))?;
        if remote.as_u64() != self.chain_id {
            warn!(
                expected = self.chain_id,
                remote = remote.as_u64(),
                "RPC endpoint serves a different chain"
            );
        }
        self.connected.store(true, Ordering::SeqCst);
        info!(address = %self.address(), "Chain wallet connected");
        Ok(())
    }

    async fn disconnect(&self) -> AppResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        info!("Chain wallet disconnected");
        Ok(())
    }

    async fn switch_network(&self, chain_id: u64) -> AppResult<()> {
        if chain_id == self.chain_id {
            return Ok(());
        }
        Err(AppError::Unsupported(format!(
            "key-backed wallet is bound to chain {}",
            self.chain_id
        )))
    }

    fn backend_name(&self) -> &'static str {
        "chain"
    }
}

#[async_trait]
impl PaymentExecutor for ChainWallet {
    async fn send(&self, transfer: &TransferRequest) -> Result<String, PaymentRejection> {
        // Only a funded wallet on the designated network moves real USDC
        if !transfer.mode.is_real() {
            return Err(PaymentRejection::new(
                RejectionKind::Other,
                format!("refusing to broadcast a {} transfer", transfer.mode),
            ));
        }
        if !self.is_connected() {
            return Err(PaymentRejection::new(
                RejectionKind::Other,
                "wallet is not connected",
            ));
        }
        if transfer.chain_id != self.chain_id {
            return Err(PaymentRejection::new(
                RejectionKind::Other,
                format!(
                    "signer is bound to chain {}, transfer targets {}",
                    self.chain_id, transfer.chain_id
                ),
            ));
        }
        let recipient: Address = transfer.recipient.parse().map_err(|e| {
            PaymentRejection::new(
                RejectionKind::Other,
                format!("invalid recipient {}: {}", transfer.recipient, e),
            )
        })?;

        let call = self.token.transfer(recipient, transfer.amount.base_units());
        let pending = call
            .send()
            .await
            .map_err(|e| PaymentRejection::from_message(e.to_string()))?;

        let tx_hash = format!("{:?}", pending.tx_hash());
        info!(%tx_hash, amount = %transfer.amount, "USDC transfer broadcast");
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: &str) -> ConfirmationOutcome {
        let hash: H256 = match tx_hash.parse() {
            Ok(hash) => hash,
            Err(e) => {
                return ConfirmationOutcome::Failed {
                    reason: format!("invalid transaction hash {}: {}", tx_hash, e),
                }
            }
        };

        let client = self.client.clone();
        let receipt = with_retry(&self.receipt_policy, move || {
            let client = client.clone();
            async move {
                match client.get_transaction_receipt(hash).await {
                    Ok(Some(receipt)) => Ok(receipt),
                    Ok(None) => Err("receipt not available yet".to_string()),
                    Err(e) => Err(e.to_string()),
                }
            }
            .boxed()
        })
        .await;

        match receipt {
            Ok(receipt) if receipt.status == Some(U64::from(1)) => ConfirmationOutcome::Succeeded,
            Ok(receipt) => {
                warn!(%tx_hash, status = ?receipt.status, "Transfer reverted");
                ConfirmationOutcome::Reverted
            }
            Err(e) => ConfirmationOutcome::Failed {
                reason: format!(
                    "no receipt after {} attempts: {}",
                    self.receipt_policy.max_attempts, e
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TransactionMode;
    use crate::config::Config;
    use std::time::Duration;

    // Well-known development key, never funded on a real network
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn wallet() -> ChainWallet {
        let config = Config::default();
        ChainWallet::new(
            &config.network,
            DEV_KEY,
            RetryPolicy::new(1, Duration::ZERO, Duration::ZERO),
        )
        .unwrap()
    }

    #[test]
    fn test_address_from_key() {
        assert_eq!(
            wallet().address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let config = Config::default();
        let policy = RetryPolicy::default();
        assert!(matches!(
            ChainWallet::new(&config.network, "not-a-key", policy),
            Err(AppError::Config(_))
        ));

        let mut network = config.network.clone();
        network.usdc_address = "0x1234".to_string();
        assert!(matches!(
            ChainWallet::new(&network, DEV_KEY, policy),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnected_wallet_is_offline() {
        let wallet = wallet();
        assert!(!wallet.read().await.unwrap().is_connected());

        let transfer = TransferRequest {
            recipient: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb1".to_string(),
            amount: TokenAmount::parse("0.10").unwrap(),
            chain_id: 5042002,
            mode: TransactionMode::Real,
        };
        let rejection = wallet.send(&transfer).await.unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Other);
    }

    #[tokio::test]
    async fn test_simulation_transfer_is_never_broadcast() {
        let wallet = wallet();
        let transfer = TransferRequest {
            recipient: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb1".to_string(),
            amount: TokenAmount::parse("0.10").unwrap(),
            chain_id: 5042002,
            mode: TransactionMode::Simulation,
        };
        let rejection = wallet.send(&transfer).await.unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Other);
        assert!(rejection.message.contains("simulation"));
    }

    #[tokio::test]
    async fn test_switch_network_is_unsupported() {
        let wallet = wallet();
        assert!(wallet.switch_network(5042002).await.is_ok());
        assert!(matches!(
            wallet.switch_network(1).await,
            Err(AppError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_rejects_malformed_hash() {
        let outcome = wallet().confirm("not-a-hash").await;
        assert!(matches!(outcome, ConfirmationOutcome::Failed { .. }));
    }
}
