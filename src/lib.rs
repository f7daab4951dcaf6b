// Agent402 - autonomous agent paying for AI services over HTTP 402 with USDC

pub mod agent;
pub mod catalog;
pub mod config;
pub mod context;
pub mod payment;
pub mod tui;
pub mod types;
pub mod utils;
pub mod wallet;

// Re-exports for convenience
pub use config::Config;
pub use context::AppContext;
pub use types::{AppError, AppResult};
