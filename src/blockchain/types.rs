//! Chain-specific types and error definitions.

use alloy::primitives::{TxHash, U256};
use thiserror::Error;

use crate::resilience::FailoverError;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// No configured endpoint answered the connectivity probe.
    #[error("no reachable RPC endpoint: {0}")]
    AllEndpointsFailed(FailoverError),

    /// Neither the fee market nor `eth_gasPrice` produced a price.
    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    /// Transaction was not confirmed within expected time.
    #[error("transaction {tx_hash} (nonce {nonce}) not confirmed after {waited_secs} seconds")]
    ConfirmationTimeout {
        tx_hash: TxHash,
        nonce: u64,
        waited_secs: u64,
    },

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(TxHash),

    /// Signing or broadcasting failed; nothing reached the mempool.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Invalid private key format or derivation error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// ENS name has no resolver or address.
    #[error("ENS name '{0}' does not resolve")]
    EnsNotFound(String),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// How the fee fields of a transaction are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasStrategy {
    /// Single `gasPrice` field.
    Legacy,
    /// `maxFeePerGas` + `maxPriorityFeePerGas`.
    Eip1559,
}

impl GasStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GasStrategy::Legacy => "legacy",
            GasStrategy::Eip1559 => "eip1559",
        }
    }
}

impl std::fmt::Display for GasStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the gas price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPriceSource {
    Oracle,
    FeeMarket,
    Node,
}

/// Gas parameters for one payment attempt. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasEstimate {
    pub gas_limit: u64,
    /// Price per gas used for the cost bound (legacy price or max fee), in wei.
    pub gas_price: u128,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    /// `gas_limit × gas_price`, the most the transaction can spend on gas.
    pub total_cost: U256,
    pub strategy: GasStrategy,
    pub price_source: GasPriceSource,
    /// The limit came from a fixed fallback rather than `eth_estimateGas`.
    pub limit_is_fallback: bool,
}

/// The parts of a receipt the payment flow reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl ReceiptSummary {
    /// Fee actually paid: gas used × effective gas price.
    pub fn fee_paid(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Transaction is pending in mempool.
    Pending,
    /// Transaction has been mined but not enough confirmations.
    Confirming { current: u64, required: u64 },
    /// Transaction is confirmed with required block depth.
    Confirmed(ReceiptSummary),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CandidateFailure;

    #[test]
    fn test_error_display() {
        let err = BlockchainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = BlockchainError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500,
        };
        assert!(err.to_string().contains("600"));

        let err = BlockchainError::ConfirmationTimeout {
            tx_hash: TxHash::ZERO,
            nonce: 7,
            waited_secs: 120,
        };
        assert!(err.to_string().contains("nonce 7"));

        let err = BlockchainError::AllEndpointsFailed(FailoverError {
            failures: vec![CandidateFailure {
                index: 0,
                reason: "refused".to_string(),
            }],
        });
        assert!(err.to_string().contains("#0 refused"));
    }

    #[test]
    fn test_fee_paid() {
        let receipt = ReceiptSummary {
            tx_hash: TxHash::ZERO,
            success: true,
            block_number: Some(10),
            gas_used: 21_000,
            effective_gas_price: 30_000_000_000,
        };
        assert_eq!(receipt.fee_paid(), U256::from(630_000_000_000_000u64));
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(GasStrategy::Legacy.to_string(), "legacy");
        assert_eq!(GasStrategy::Eip1559.as_str(), "eip1559");
    }
}
