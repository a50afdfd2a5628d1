//! Payment intents: what the operator asked for, checked against the registry.

use alloy::primitives::utils::parse_units;
use alloy::primitives::{Address, U256};

use crate::config::{PayConfig, PaymentConfig};
use crate::payments::error::{PaymentError, PaymentResult};

/// Asset key meaning the network's native coin.
pub const NATIVE: &str = "native";

/// Decimals used to compare amounts against configured limits.
const LIMIT_DECIMALS: u8 = 18;

/// A requested transfer, before anything touches the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    /// Network key from the registry.
    pub network: String,
    /// `native` or a token key from the registry.
    pub asset: String,
    /// Human-unit decimal string, e.g. `"12.5"`.
    pub amount: String,
    /// Hex address or ENS name. Empty means the configured merchant.
    pub recipient: String,
}

impl TransactionIntent {
    pub fn new(network: impl Into<String>, asset: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            asset: asset.into(),
            amount: amount.into(),
            recipient: String::new(),
        }
    }

    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }
}

/// The asset of an intent, looked up in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub key: String,
    pub symbol: String,
    pub decimals: u8,
    pub price_id: String,
    pub stable: bool,
    /// Token contract; `None` for the native coin.
    pub contract: Option<Address>,
}

/// Look up the intent's asset on its network.
pub fn resolve_asset(config: &PayConfig, network_key: &str, asset: &str) -> PaymentResult<ResolvedAsset> {
    let network = config
        .network(network_key)
        .ok_or_else(|| PaymentError::UnknownNetwork(network_key.to_string()))?;

    if asset.eq_ignore_ascii_case(NATIVE) {
        return Ok(ResolvedAsset {
            key: NATIVE.to_string(),
            symbol: network.symbol.clone(),
            decimals: 18,
            price_id: network.price_id.clone(),
            stable: false,
            contract: None,
        });
    }

    let not_supported = || PaymentError::TokenNotSupported {
        token: asset.to_string(),
        network: network.name.clone(),
    };
    let token = config.token(asset).ok_or_else(not_supported)?;
    let contract = token
        .addresses
        .get(network_key)
        .and_then(|a| a.parse::<Address>().ok())
        .ok_or_else(not_supported)?;

    Ok(ResolvedAsset {
        key: asset.to_string(),
        symbol: token.symbol.clone(),
        decimals: token.decimals,
        price_id: token.price_id.clone(),
        stable: token.stable,
        contract: Some(contract),
    })
}

/// Parse a human amount into base units, enforcing `0 < amount`, `min ≤ amount ≤ max`.
pub fn parse_amount(amount: &str, decimals: u8, limits: &PaymentConfig) -> PaymentResult<U256> {
    let amount = amount.trim();
    let invalid = || PaymentError::InvalidAmount(amount.to_string());
    if amount.is_empty() || amount.starts_with('-') {
        return Err(invalid());
    }

    let units = parse_units(amount, decimals).map_err(|_| invalid())?.get_absolute();
    if units.is_zero() {
        return Err(invalid());
    }

    let scaled = parse_units(amount, LIMIT_DECIMALS).map_err(|_| invalid())?.get_absolute();
    if let Ok(min) = parse_units(&limits.min_amount, LIMIT_DECIMALS) {
        if scaled < min.get_absolute() {
            return Err(PaymentError::BelowMinimum {
                amount: amount.to_string(),
                min: limits.min_amount.clone(),
            });
        }
    }
    if let Ok(max) = parse_units(&limits.max_amount, LIMIT_DECIMALS) {
        if scaled > max.get_absolute() {
            return Err(PaymentError::AboveMaximum {
                amount: amount.to_string(),
                max: limits.max_amount.clone(),
            });
        }
    }

    Ok(units)
}
