//! Payment flow errors.

use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::blockchain::BlockchainError;
use crate::card::CardError;
use crate::payments::sufficiency::Shortfall;
use crate::secret::SecretError;

/// Everything that can stop a payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Card(#[from] CardError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Blockchain(#[from] BlockchainError),

    #[error("{0}")]
    Insufficient(Shortfall),

    #[error("insufficient {symbol} balance: have {have}, need {need}")]
    InsufficientTokenBalance { symbol: String, have: U256, need: U256 },

    #[error("insufficient native balance for gas: have {have}, need {need}")]
    InsufficientGas { have: U256, need: U256 },

    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("amount {amount} is below the minimum {min}")]
    BelowMinimum { amount: String, min: String },

    #[error("amount {amount} exceeds the maximum {max}")]
    AboveMaximum { amount: String, max: String },

    #[error("token '{token}' is not available on {network}")]
    TokenNotSupported { token: String, network: String },

    #[error("unknown network '{0}'")]
    UnknownNetwork(String),

    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),

    #[error("card address {card} does not match its key ({key})")]
    AddressMismatch { card: Address, key: Address },

    #[error("payment cancelled before broadcast")]
    Cancelled,
}

impl PaymentError {
    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            PaymentError::Card(_) => "card_error",
            PaymentError::Secret(_) => "invalid_pin",
            PaymentError::Blockchain(BlockchainError::ConfirmationTimeout { .. }) => "unconfirmed",
            PaymentError::Blockchain(BlockchainError::Reverted(_)) => "reverted",
            PaymentError::Blockchain(_) => "chain_error",
            PaymentError::Insufficient(_)
            | PaymentError::InsufficientTokenBalance { .. }
            | PaymentError::InsufficientGas { .. } => "insufficient",
            PaymentError::Cancelled => "cancelled",
            _ => "rejected",
        }
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;
