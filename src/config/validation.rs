//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (tokens reference existing networks)
//! - Validate value ranges (timeouts > 0, multiplier >= 100, amounts parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::utils::parse_units;
use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::PayConfig;

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no networks configured")]
    NoNetworks,

    #[error("network '{0}' has no rpc_urls")]
    NoRpcUrls(String),

    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: String, value: String },

    #[error("{field}: invalid address '{value}'")]
    InvalidAddress { field: String, value: String },

    #[error("{field}: invalid amount '{value}'")]
    InvalidAmount { field: String, value: String },

    #[error("payment.min_amount exceeds payment.max_amount")]
    MinAboveMax,

    #[error("{0} must be greater than zero")]
    Zero(String),

    #[error("gas.limit_multiplier_percent must be at least 100, got {0}")]
    MultiplierTooLow(u64),

    #[error("token '{token}' references unknown network '{network}'")]
    UnknownNetwork { token: String, network: String },

    #[error("token '{token}' has {decimals} decimals (max 36)")]
    TooManyDecimals { token: String, decimals: u8 },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &PayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.networks.is_empty() {
        errors.push(ValidationError::NoNetworks);
    }

    for (key, network) in &config.networks {
        if network.rpc_urls.is_empty() {
            errors.push(ValidationError::NoRpcUrls(key.clone()));
        }
        for url in &network.rpc_urls {
            check_url(&mut errors, &format!("networks.{}.rpc_urls", key), url);
        }
        if let Some(oracle) = &network.gas_oracle_url {
            check_url(&mut errors, &format!("networks.{}.gas_oracle_url", key), oracle);
        }
        if network.chain_id == 0 {
            errors.push(ValidationError::Zero(format!("networks.{}.chain_id", key)));
        }
    }

    for (key, token) in &config.tokens {
        if token.decimals > 36 {
            errors.push(ValidationError::TooManyDecimals {
                token: key.clone(),
                decimals: token.decimals,
            });
        }
        for (network, address) in &token.addresses {
            if !config.networks.contains_key(network) {
                errors.push(ValidationError::UnknownNetwork {
                    token: key.clone(),
                    network: network.clone(),
                });
            }
            if address.parse::<Address>().is_err() {
                errors.push(ValidationError::InvalidAddress {
                    field: format!("tokens.{}.addresses.{}", key, network),
                    value: address.clone(),
                });
            }
        }
    }

    let merchant = config.payment.merchant_address.trim();
    if !merchant.is_empty() && !merchant.ends_with(".eth") && merchant.parse::<Address>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "payment.merchant_address".to_string(),
            value: merchant.to_string(),
        });
    }

    let min = parse_units(&config.payment.min_amount, 18).map(|u| u.get_absolute());
    let max = parse_units(&config.payment.max_amount, 18).map(|u| u.get_absolute());
    match (min, max) {
        (Ok(min), Ok(max)) if min > max => errors.push(ValidationError::MinAboveMax),
        (min, max) => {
            if min.is_err() {
                errors.push(ValidationError::InvalidAmount {
                    field: "payment.min_amount".to_string(),
                    value: config.payment.min_amount.clone(),
                });
            }
            if max.is_err() {
                errors.push(ValidationError::InvalidAmount {
                    field: "payment.max_amount".to_string(),
                    value: config.payment.max_amount.clone(),
                });
            }
        }
    }

    if config.gas.limit_multiplier_percent < 100 {
        errors.push(ValidationError::MultiplierTooLow(
            config.gas.limit_multiplier_percent,
        ));
    }

    let positive = [
        ("rpc.probe_timeout_ms", config.rpc.probe_timeout_ms),
        ("rpc.request_timeout_secs", config.rpc.request_timeout_secs),
        ("card.nfc_timeout_secs", config.card.nfc_timeout_secs),
        ("payment.confirmation_timeout_secs", config.payment.confirmation_timeout_secs),
        ("gas.native_fallback_limit", config.gas.native_fallback_limit),
        ("gas.token_fallback_limit", config.gas.token_fallback_limit),
        ("gas.high_gas_fallback_limit", config.gas.high_gas_fallback_limit),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if url::Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}
