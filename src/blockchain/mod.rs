//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! NetworkConfig.rpc_urls
//!     → client.rs (probe in order, bind first reachable, timeouts)
//! CardSecret
//!     → wallet.rs (signing key)
//! Transfer + Wallet
//!     → transaction.rs (gas limit, gas price ladder, sign, broadcast, confirm)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from a decrypted card secret
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - A broadcast is never retried automatically

pub mod client;
pub mod contracts;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{BlockchainClient, ChainRpc, FeeMarket};
pub use transaction::{SubmittedTx, Transfer, TxBuilder};
pub use types::{
    BlockchainError, BlockchainResult, ConfirmationStatus, GasEstimate, GasPriceSource,
    GasStrategy, ReceiptSummary,
};
pub use wallet::Wallet;
