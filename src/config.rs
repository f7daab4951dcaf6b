use crate::types::{AppError, AppResult};
use crate::utils::RetryPolicy;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Chain id of Arc Testnet, the designated network for real payments.
pub const ARC_TESTNET_CHAIN_ID: u64 = 5042002;

const DEFAULT_PROVIDER_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb1";
const DEFAULT_SIMULATED_ADDRESS: &str = "0x8ba1f109551bD432803012645Ac136ddd64DBA72";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub wallet: WalletConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub usdc_address: String,
    pub explorer_url: String,
}

#[derive(Clone, Deserialize)]
pub struct WalletConfig {
    pub private_key: Option<String>,
    pub simulated_balance: String,
    pub simulated_address: String,
}

// Keeps the private key out of logs.
impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("simulated_balance", &self.simulated_balance)
            .field("simulated_address", &self.simulated_address)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub provider_address: String,
    pub approval_delay_ms: u64,
    pub activity_capacity: usize,
    pub balance_refresh_secs: u64,
    pub post_payment_refresh_ms: u64,
    pub gateway_latency_ms: u64,
    pub receipt_max_attempts: u32,
    pub receipt_initial_delay_ms: u64,
    pub receipt_max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub dir: String,
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                chain_id: ARC_TESTNET_CHAIN_ID,
                name: "Arc Testnet".to_string(),
                rpc_url: "https://rpc.testnet.arc.network".to_string(),
                usdc_address: "0x3600000000000000000000000000000000000000".to_string(),
                explorer_url: "https://testnet.arcscan.app".to_string(),
            },
            wallet: WalletConfig {
                private_key: None,
                simulated_balance: "10.00".to_string(),
                simulated_address: DEFAULT_SIMULATED_ADDRESS.to_string(),
            },
            agent: AgentConfig {
                provider_address: DEFAULT_PROVIDER_ADDRESS.to_string(),
                approval_delay_ms: 500,
                activity_capacity: 20,
                balance_refresh_secs: 5,
                post_payment_refresh_ms: 2000,
                gateway_latency_ms: 800,
                receipt_max_attempts: 12,
                receipt_initial_delay_ms: 1000,
                receipt_max_delay_ms: 8000,
            },
            logging: LoggingConfig {
                dir: "logs".to_string(),
                filter: "agent402=info".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            network: NetworkConfig {
                chain_id: parse_var("ARC_CHAIN_ID", defaults.network.chain_id)?,
                name: env::var("ARC_NETWORK_NAME").unwrap_or(defaults.network.name),
                rpc_url: env::var("ARC_RPC_URL").unwrap_or(defaults.network.rpc_url),
                usdc_address: env::var("USDC_ADDRESS").unwrap_or(defaults.network.usdc_address),
                explorer_url: env::var("EXPLORER_URL").unwrap_or(defaults.network.explorer_url),
            },
            wallet: WalletConfig {
                private_key: env::var("AGENT_PRIVATE_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty()),
                simulated_balance: env::var("SIMULATED_BALANCE")
                    .unwrap_or(defaults.wallet.simulated_balance),
                simulated_address: env::var("SIMULATED_ADDRESS")
                    .unwrap_or(defaults.wallet.simulated_address),
            },
            agent: AgentConfig {
                provider_address: env::var("SERVICE_PROVIDER_ADDRESS")
                    .unwrap_or(defaults.agent.provider_address),
                approval_delay_ms: parse_var("APPROVAL_DELAY_MS", defaults.agent.approval_delay_ms)?,
                activity_capacity: parse_var(
                    "ACTIVITY_LOG_CAPACITY",
                    defaults.agent.activity_capacity,
                )?,
                balance_refresh_secs: parse_var(
                    "BALANCE_REFRESH_SECS",
                    defaults.agent.balance_refresh_secs,
                )?,
                post_payment_refresh_ms: parse_var(
                    "POST_PAYMENT_REFRESH_MS",
                    defaults.agent.post_payment_refresh_ms,
                )?,
                gateway_latency_ms: parse_var(
                    "GATEWAY_LATENCY_MS",
                    defaults.agent.gateway_latency_ms,
                )?,
                receipt_max_attempts: parse_var(
                    "RECEIPT_MAX_ATTEMPTS",
                    defaults.agent.receipt_max_attempts,
                )?,
                receipt_initial_delay_ms: parse_var(
                    "RECEIPT_INITIAL_DELAY_MS",
                    defaults.agent.receipt_initial_delay_ms,
                )?,
                receipt_max_delay_ms: parse_var(
                    "RECEIPT_MAX_DELAY_MS",
                    defaults.agent.receipt_max_delay_ms,
                )?,
            },
            logging: LoggingConfig {
                dir: env::var("LOG_DIR").unwrap_or(defaults.logging.dir),
                filter: env::var("RUST_LOG").unwrap_or(defaults.logging.filter),
            },
        })
    }

    /// Whether transfers go through a real signer instead of the simulated wallet
    pub fn uses_chain_wallet(&self) -> bool {
        self.wallet.private_key.is_some()
    }

    /// Explorer link for a transaction hash
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.network.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

impl AgentConfig {
    pub fn approval_delay(&self) -> Duration {
        Duration::from_millis(self.approval_delay_ms)
    }

    pub fn balance_refresh_interval(&self) -> Duration {
        // A zero interval would make tokio::time::interval panic
        Duration::from_secs(self.balance_refresh_secs.max(1))
    }

    pub fn post_payment_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.post_payment_refresh_ms)
    }

    pub fn gateway_latency(&self) -> Duration {
        Duration::from_millis(self.gateway_latency_ms)
    }

    /// Backoff used while polling for a transaction receipt
    pub fn receipt_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.receipt_max_attempts,
            Duration::from_millis(self.receipt_initial_delay_ms),
            Duration::from_millis(self.receipt_max_delay_ms),
        )
    }
}

fn parse_var<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{}={:?}: {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.network.chain_id, ARC_TESTNET_CHAIN_ID);
        assert_eq!(config.agent.activity_capacity, 20);
        assert!(!config.uses_chain_wallet());
        assert_eq!(config.agent.approval_delay(), Duration::from_millis(500));
        assert_eq!(config.agent.receipt_retry_policy().max_attempts, 12);
    }

    #[test]
    fn test_explorer_tx_url() {
        let mut config = Config::default();
        config.network.explorer_url = "https://testnet.arcscan.app/".to_string();
        assert_eq!(
            config.explorer_tx_url("0xabc"),
            "https://testnet.arcscan.app/tx/0xabc"
        );
    }

    #[test]
    fn test_parse_var() {
        std::env::set_var("AGENT402_TEST_PARSE_OK", " 42 ");
        std::env::set_var("AGENT402_TEST_PARSE_BAD", "forty-two");

        assert_eq!(parse_var("AGENT402_TEST_PARSE_OK", 0u64).unwrap(), 42);
        assert_eq!(parse_var("AGENT402_TEST_PARSE_MISSING", 7u64).unwrap(), 7);
        assert!(matches!(
            parse_var("AGENT402_TEST_PARSE_BAD", 0u64),
            Err(AppError::Config(_))
        ));

        std::env::remove_var("AGENT402_TEST_PARSE_OK");
        std::env::remove_var("AGENT402_TEST_PARSE_BAD");
    }

    #[test]
    fn test_zero_refresh_interval_is_clamped() {
        let mut config = Config::default();
        config.agent.balance_refresh_secs = 0;
        assert_eq!(config.agent.balance_refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_wallet_config_debug_redacts_key() {
        let mut config = Config::default();
        config.wallet.private_key = Some("0xdeadbeef".to_string());
        let printed = format!("{:?}", config.wallet);
        assert!(!printed.contains("deadbeef"));
        assert!(printed.contains("<redacted>"));
    }
}
