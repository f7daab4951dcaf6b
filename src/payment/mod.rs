// Payments: token amounts, the x402 service protocol and transfer execution

pub mod amount;
pub mod chain;
pub mod executor;
pub mod x402;

pub use amount::*;
pub use chain::ChainWallet;
pub use executor::*;
pub use x402::*;
