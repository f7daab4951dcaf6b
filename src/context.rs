// Application wiring: wallet backend, balance watcher, gateway and runtime

use std::sync::Arc;
use tracing::info;

use crate::agent::{ActivityKind, AgentRuntime, AgentSession, RuntimeSettings};
use crate::config::Config;
use crate::payment::{ChainWallet, MockServiceGateway, PaymentExecutor, TokenAmount};
use crate::types::AppResult;
use crate::wallet::{BalanceOracle, BalanceWatcher, SimulatedWallet, WalletControl};

/// The payer wallet behind its three roles
pub struct WalletBackend {
    pub oracle: Arc<dyn BalanceOracle>,
    pub control: Arc<dyn WalletControl>,
    pub executor: Arc<dyn PaymentExecutor>,
    /// Set only for the in-memory wallet, which supports test toggles
    pub simulated: Option<Arc<SimulatedWallet>>,
}

impl WalletBackend {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        match &config.wallet.private_key {
            Some(key) => {
                let wallet = Arc::new(ChainWallet::new(
                    &config.network,
                    key,
                    config.agent.receipt_retry_policy(),
                )?);
                info!(address = %wallet.address(), rpc = %config.network.rpc_url, "Using on-chain wallet");
                Ok(Self {
                    oracle: wallet.clone(),
                    control: wallet.clone(),
                    executor: wallet,
                    simulated: None,
                })
            }
            None => {
                let balance = TokenAmount::parse(&config.wallet.simulated_balance)?;
                let wallet = Arc::new(SimulatedWallet::new(
                    config.wallet.simulated_address.clone(),
                    config.network.chain_id,
                    balance,
                ));
                info!(address = %config.wallet.simulated_address, %balance, "Using simulated wallet");
                Ok(Self {
                    oracle: wallet.clone(),
                    control: wallet.clone(),
                    executor: wallet.clone(),
                    simulated: Some(wallet),
                })
            }
        }
    }
}

/// Everything a front end needs to drive one agent session
pub struct AppContext {
    pub config: Config,
    pub wallet: WalletBackend,
    pub watcher: BalanceWatcher,
    pub runtime: AgentRuntime,
}

impl AppContext {
    /// Must be called inside a tokio runtime; spawns the balance watcher.
    pub fn build(config: Config) -> AppResult<Self> {
        let wallet = WalletBackend::from_config(&config)?;
        let watcher = BalanceWatcher::spawn(
            wallet.oracle.clone(),
            config.agent.balance_refresh_interval(),
        );

        let gateway = Arc::new(
            MockServiceGateway::new(config.network.chain_id, config.network.name.clone())
                .with_latency(config.agent.gateway_latency())
                .with_settlement_on_chain(config.uses_chain_wallet()),
        );

        let runtime = AgentRuntime::new(
            AgentSession::new(config.network.chain_id, config.agent.activity_capacity),
            watcher.subscribe(),
            watcher.refresher(),
            gateway,
            wallet.executor.clone(),
            RuntimeSettings::from_config(&config.agent),
        );

        Ok(Self {
            config,
            wallet,
            watcher,
            runtime,
        })
    }

    pub async fn connect_wallet(&mut self) -> AppResult<()> {
        self.wallet.control.connect().await?;
        self.runtime.note(
            ActivityKind::Network,
            format!("Wallet connected ({})", self.wallet.control.backend_name()),
            None,
        );
        self.watcher.refresher().refresh_now();
        Ok(())
    }

    pub async fn disconnect_wallet(&mut self) -> AppResult<()> {
        self.wallet.control.disconnect().await?;
        self.runtime
            .note(ActivityKind::Network, "Wallet disconnected", None);
        self.watcher.refresher().refresh_now();
        Ok(())
    }

    /// Ask the wallet to move to the designated network
    pub async fn switch_to_designated_network(&mut self) -> AppResult<()> {
        let chain_id = self.config.network.chain_id;
        self.wallet.control.switch_network(chain_id).await?;
        self.runtime.note(
            ActivityKind::Network,
            format!("Switched to {}", self.config.network.name),
            Some(serde_json::json!({ "chain_id": chain_id })),
        );
        self.watcher.refresher().refresh_now();
        Ok(())
    }

    /// Wait until the watcher has published a snapshot reflecting the last
    /// wallet operation
    pub async fn sync_wallet(&mut self) -> AppResult<()> {
        let snapshot = self.wallet.oracle.read().await?;
        let mut rx = self.watcher.subscribe();
        while *rx.borrow_and_update() != snapshot {
            if rx.changed().await.is_err() {
                break;
            }
        }
        self.runtime.observe_wallet();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;
    use crate::catalog;
    use tokio_test::assert_ok;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.agent.approval_delay_ms = 0;
        config.agent.gateway_latency_ms = 0;
        config.agent.post_payment_refresh_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_default_config_uses_simulated_wallet() {
        let context = AppContext::build(test_config()).unwrap();
        assert!(context.wallet.simulated.is_some());
        assert_eq!(context.wallet.control.backend_name(), "simulated");
    }

    #[tokio::test]
    async fn test_bad_simulated_balance_is_rejected() {
        let mut config = test_config();
        config.wallet.simulated_balance = "lots".to_string();
        assert!(AppContext::build(config).is_err());
    }

    #[tokio::test]
    async fn test_connect_then_pay() {
        let mut context = AppContext::build(test_config()).unwrap();
        assert_ok!(context.connect_wallet().await);
        assert_ok!(context.sync_wallet().await);
        assert!(context.runtime.wallet().is_connected());

        let service = catalog::find_service("gpt4-api").unwrap();
        context.runtime.select_service(service);
        context.runtime.request_service();
        context.runtime.run_until_settled().await;
        context.runtime.approve_payment();
        context.runtime.run_until_settled().await;

        assert_eq!(context.runtime.session().state(), AgentState::Success);
    }

    #[tokio::test]
    async fn test_disconnect_blocks_requests() {
        let mut context = AppContext::build(test_config()).unwrap();
        context.connect_wallet().await.unwrap();
        context.sync_wallet().await.unwrap();
        context.disconnect_wallet().await.unwrap();
        context.sync_wallet().await.unwrap();

        context
            .runtime
            .select_service(catalog::find_service("image-gen").unwrap());
        context.runtime.request_service();
        assert_eq!(context.runtime.session().state(), AgentState::Error);
        assert_eq!(
            context.runtime.session().last_error(),
            Some("Wallet not connected")
        );
    }
}
