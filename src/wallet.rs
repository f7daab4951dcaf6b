//! Payer wallet
//!
//! The agent only ever sees a [`WalletSnapshot`]: who is connected, on which
//! chain, holding how much. A [`BalanceWatcher`] keeps that snapshot fresh by
//! polling a [`BalanceOracle`] on an interval and on demand.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::payment::{
    ConfirmationOutcome, PaymentExecutor, PaymentRejection, RejectionKind, TokenAmount,
    TransferRequest,
};
use crate::types::{AppError, AppResult};

/// Read-only view of the payer's wallet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WalletSnapshot {
    pub address: Option<String>,
    pub chain_id: Option<u64>,
    pub balance: Option<TokenAmount>,
}

impl WalletSnapshot {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connected(address: impl Into<String>, chain_id: u64, balance: TokenAmount) -> Self {
        Self {
            address: Some(address.into()),
            chain_id: Some(chain_id),
            balance: Some(balance),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    /// Unknown balances count as empty
    pub fn balance_or_zero(&self) -> TokenAmount {
        self.balance.unwrap_or_default()
    }

    pub fn is_on_chain(&self, chain_id: u64) -> bool {
        self.chain_id == Some(chain_id)
    }

    /// `0x1234...abcd` form of the address
    pub fn short_address(&self) -> Option<String> {
        self.address.as_ref().map(|address| {
            if address.len() <= 10 || !address.is_ascii() {
                address.clone()
            } else {
                format!("{}...{}", &address[..6], &address[address.len() - 4..])
            }
        })
    }
}

/// Source of wallet snapshots
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    async fn read(&self) -> AppResult<WalletSnapshot>;
}

/// Connection management exposed to the user
#[async_trait]
pub trait WalletControl: Send + Sync {
    async fn connect(&self) -> AppResult<()>;
    async fn disconnect(&self) -> AppResult<()>;
    async fn switch_network(&self, chain_id: u64) -> AppResult<()>;

    /// Short label for the display
    fn backend_name(&self) -> &'static str;
}

// =============================================================================
// Simulated wallet
// =============================================================================

struct SimulatedState {
    connected: bool,
    chain_id: u64,
    balance: TokenAmount,
    decline_next: bool,
    revert_next: bool,
    pending: HashMap<String, TokenAmount>,
}

/// In-memory wallet: balance oracle, wallet control and payment executor in one
pub struct SimulatedWallet {
    address: String,
    confirm_latency: Duration,
    state: Mutex<SimulatedState>,
}

impl SimulatedWallet {
    pub fn new(address: impl Into<String>, chain_id: u64, balance: TokenAmount) -> Self {
        Self {
            address: address.into(),
            confirm_latency: Duration::ZERO,
            state: Mutex::new(SimulatedState {
                connected: false,
                chain_id,
                balance,
                decline_next: false,
                revert_next: false,
                pending: HashMap::new(),
            }),
        }
    }

    /// Time between submission and finalization
    pub fn with_confirm_latency(mut self, latency: Duration) -> Self {
        self.confirm_latency = latency;
        self
    }

    /// The next transfer is declined as if the user refused to sign it
    pub async fn decline_next_transfer(&self) {
        self.state.lock().await.decline_next = true;
    }

    /// The next confirmed transfer reverts on chain
    pub async fn revert_next_transfer(&self) {
        self.state.lock().await.revert_next = true;
    }

    pub async fn set_balance(&self, balance: TokenAmount) {
        self.state.lock().await.balance = balance;
    }
}

#[async_trait]
impl BalanceOracle for SimulatedWallet {
    async fn read(&self) -> AppResult<WalletSnapshot> {
        let state = self.state.lock().await;
        if !state.connected {
            return Ok(WalletSnapshot::disconnected());
        }
        Ok(WalletSnapshot::connected(
            self.address.clone(),
            state.chain_id,
            state.balance,
        ))
    }
}

#[async_trait]
impl WalletControl for SimulatedWallet {
    async fn connect(&self) -> AppResult<()> {
        self.state.lock().await.connected = true;
        info!(address = %self.address, "Simulated wallet connected");
        Ok(())
    }

    async fn disconnect(&self) -> AppResult<()> {
        self.state.lock().await.connected = false;
        info!("Simulated wallet disconnected");
        Ok(())
    }

    async fn switch_network(&self, chain_id: u64) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(AppError::Wallet("wallet is not connected".to_string()));
        }
        state.chain_id = chain_id;
        info!(chain_id, "Simulated wallet switched network");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "simulated"
    }
}

#[async_trait]
impl PaymentExecutor for SimulatedWallet {
    async fn send(&self, transfer: &TransferRequest) -> Result<String, PaymentRejection> {
        let mut state = self.state.lock().await;

        if !state.connected {
            return Err(PaymentRejection::new(
                RejectionKind::Other,
                "wallet is not connected",
            ));
        }
        if state.decline_next {
            state.decline_next = false;
            return Err(PaymentRejection::new(
                RejectionKind::UserDeclined,
                "User rejected the request.",
            ));
        }
        if state.chain_id != transfer.chain_id {
            return Err(PaymentRejection::new(
                RejectionKind::Other,
                format!("wallet is on chain {}, transfer targets {}", state.chain_id, transfer.chain_id),
            ));
        }
        let committed = state
            .pending
            .values()
            .fold(TokenAmount::zero(), |acc, amount| {
                TokenAmount::from_base_units(acc.base_units().saturating_add(amount.base_units()))
            });
        if state.balance.saturating_sub(&committed) < transfer.amount {
            return Err(PaymentRejection::new(
                RejectionKind::InsufficientFunds,
                "ERC20: transfer amount exceeds balance",
            ));
        }

        let tx_hash = format!("0x{}", hex::encode(rand::random::<[u8; 32]>()));
        state.pending.insert(tx_hash.clone(), transfer.amount);
        debug!(%tx_hash, amount = %transfer.amount, mode = %transfer.mode, "Simulated transfer submitted");
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: &str) -> ConfirmationOutcome {
        if !self.confirm_latency.is_zero() {
            tokio::time::sleep(self.confirm_latency).await;
        }

        let mut state = self.state.lock().await;
        let Some(amount) = state.pending.remove(tx_hash) else {
            return ConfirmationOutcome::Failed {
                reason: format!("unknown transaction {}", tx_hash),
            };
        };
        if state.revert_next {
            state.revert_next = false;
            return ConfirmationOutcome::Reverted;
        }

        state.balance = state.balance.saturating_sub(&amount);
        ConfirmationOutcome::Succeeded
    }
}

// =============================================================================
// Balance watcher
// =============================================================================

/// Asks the watcher for an out-of-schedule refresh
#[derive(Clone, Default)]
pub struct BalanceRefresher {
    notify: Arc<Notify>,
}

impl BalanceRefresher {
    pub fn refresh_now(&self) {
        self.notify.notify_one();
    }

    /// One-shot refresh after `delay`
    pub fn refresh_after(&self, delay: Duration) {
        let notify = self.notify.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            notify.notify_one();
        });
    }
}

/// Background task publishing wallet snapshots
pub struct BalanceWatcher {
    snapshot_rx: watch::Receiver<WalletSnapshot>,
    refresher: BalanceRefresher,
    handle: JoinHandle<()>,
}

impl BalanceWatcher {
    pub fn spawn(oracle: Arc<dyn BalanceOracle>, interval: Duration) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(WalletSnapshot::disconnected());
        let refresher = BalanceRefresher::default();
        let notify = refresher.notify.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = notify.notified() => {}
                }

                if snapshot_tx.is_closed() {
                    break;
                }

                match oracle.read().await {
                    Ok(snapshot) => {
                        snapshot_tx.send_if_modified(|current| {
                            if *current == snapshot {
                                false
                            } else {
                                debug!(?snapshot, "Wallet snapshot changed");
                                *current = snapshot;
                                true
                            }
                        });
                    }
                    Err(e) => warn!("Balance refresh failed: {}", e),
                }
            }
        });

        Self {
            snapshot_rx,
            refresher,
            handle,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn refresher(&self) -> BalanceRefresher {
        self.refresher.clone()
    }
}

impl Drop for BalanceWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
