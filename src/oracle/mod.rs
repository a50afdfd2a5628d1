//! External HTTP oracles.
//!
//! # Data Flow
//! ```text
//! gas.rs:   block-explorer gas oracle → suggested legacy gas price
//! price.rs: CoinGecko → CryptoCompare → Binance → Coinbase → defaults
//! ```
//!
//! # Design Decisions
//! - Oracle failures never abort a payment; callers degrade to the next rung
//! - Every request is bounded by a client-level timeout

pub mod gas;
pub mod price;

use thiserror::Error;

pub use gas::{GasOracle, GasOracleClient};
pub use price::{PriceAggregator, PriceAsset, PriceSet, PriceSource, DEFAULT_SOURCE};

/// Errors from the gas oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("gas oracle request failed: {0}")]
    Http(String),

    #[error("gas oracle returned status {status}: {message}")]
    Status { status: String, message: String },

    #[error("gas oracle response malformed: {0}")]
    Parse(String),
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Errors from a single price source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("{source_name}: request failed: {reason}")]
    Http { source_name: String, reason: String },

    #[error("{source_name}: malformed response: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("{source_name}: no usable price for {missing:?}")]
    Incomplete {
        source_name: String,
        missing: Vec<String>,
    },
}

pub type PriceResult<T> = Result<T, PriceError>;

/// Shared HTTP client builder for oracle requests.
pub(crate) fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("tap-pay/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}
