//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the payment
//! terminal. All types derive Serde traits for deserialization from config files.
//! Network and token registries live here as plain data so they can be
//! swapped per deployment (or per test) without touching code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the payment terminal.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PayConfig {
    /// Merchant and amount settings.
    pub payment: PaymentConfig,

    /// RPC endpoint selection and request timeouts.
    pub rpc: RpcConfig,

    /// Gas estimation settings.
    pub gas: GasConfig,

    /// Card reader settings.
    pub card: CardConfig,

    /// Price oracle settings.
    pub prices: PriceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Supported chains, keyed by short name (e.g. "polygon").
    pub networks: BTreeMap<String, NetworkConfig>,

    /// Supported ERC-20 tokens, keyed by short name (e.g. "usdc").
    pub tokens: BTreeMap<String, TokenConfig>,
}

impl PayConfig {
    /// Look up a network by key.
    pub fn network(&self, key: &str) -> Option<&NetworkConfig> {
        self.networks.get(key)
    }

    /// Look up a token by key.
    pub fn token(&self, key: &str) -> Option<&TokenConfig> {
        self.tokens.get(key)
    }
}

/// Merchant and payment limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Address (or ENS name) that receives payments.
    pub merchant_address: String,

    /// Smallest accepted amount, in human units of the selected asset.
    pub min_amount: String,

    /// Largest accepted amount, in human units of the selected asset.
    pub max_amount: String,

    /// Number of block confirmations to wait for after broadcast.
    pub confirmations: u64,

    /// Maximum time to wait for confirmations in seconds.
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            merchant_address: String::new(),
            min_amount: "0.0001".to_string(),
            max_amount: "10.0".to_string(),
            confirmations: 1,
            confirmation_timeout_secs: 120,
            poll_interval_ms: 2000,
        }
    }
}

/// RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Per-endpoint connectivity probe timeout in milliseconds.
    pub probe_timeout_ms: u64,

    /// Timeout for every RPC call on the selected endpoint, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5000,
            request_timeout_secs: 10,
        }
    }
}

/// Gas estimation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GasConfig {
    /// Safety margin applied to a successful `eth_estimateGas` (110 = +10%).
    pub limit_multiplier_percent: u64,

    /// Gas limit used for a native transfer when estimation fails.
    pub native_fallback_limit: u64,

    /// Gas limit used for a token transfer when estimation fails.
    pub token_fallback_limit: u64,

    /// Gas limit used on `high_gas` networks when estimation fails.
    pub high_gas_fallback_limit: u64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Gas oracle request timeout in seconds.
    pub oracle_timeout_secs: u64,

    /// Optional API key appended to gas oracle requests.
    pub oracle_api_key: Option<String>,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            limit_multiplier_percent: 110,
            native_fallback_limit: 21_000,
            token_fallback_limit: 65_000,
            high_gas_fallback_limit: 100_000,
            max_gas_price_gwei: 500,
            oracle_timeout_secs: 5,
            oracle_api_key: None,
        }
    }
}

/// Card reader configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CardConfig {
    /// NFC read timeout in seconds.
    pub nfc_timeout_secs: u64,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self { nfc_timeout_secs: 15 }
    }
}

/// Known spot price providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSourceKind {
    CoinGecko,
    CryptoCompare,
    Binance,
    Coinbase,
}

/// Price oracle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PriceConfig {
    /// Sources in priority order.
    pub sources: Vec<PriceSourceKind>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    pub coingecko_url: String,
    pub cryptocompare_url: String,
    pub binance_url: String,
    pub coinbase_url: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                PriceSourceKind::CoinGecko,
                PriceSourceKind::CryptoCompare,
                PriceSourceKind::Binance,
                PriceSourceKind::Coinbase,
            ],
            timeout_secs: 5,
            coingecko_url: "https://api.coingecko.com".to_string(),
            cryptocompare_url: "https://min-api.cryptocompare.com".to_string(),
            binance_url: "https://api.binance.com".to_string(),
            coinbase_url: "https://api.coinbase.com".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// A single EVM chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Display name (e.g. "Polygon").
    pub name: String,

    /// Chain ID for EIP-155 replay protection.
    pub chain_id: u64,

    /// Native asset symbol (e.g. "MATIC").
    pub symbol: String,

    /// JSON-RPC endpoints, tried in order.
    pub rpc_urls: Vec<String>,

    /// Block explorer base URL.
    #[serde(default)]
    pub explorer: String,

    /// Price identifier of the native asset (CoinGecko id).
    pub price_id: String,

    /// Block-explorer style gas oracle endpoint.
    #[serde(default)]
    pub gas_oracle_url: Option<String>,

    /// Known higher-gas L2: larger fallback gas limit.
    #[serde(default)]
    pub high_gas: bool,

    /// Lower bound applied to every gas limit on this network.
    #[serde(default)]
    pub min_gas_limit: Option<u64>,
}

impl NetworkConfig {
    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        if self.explorer.is_empty() {
            return None;
        }
        Some(format!("{}/tx/{}", self.explorer.trim_end_matches('/'), tx_hash))
    }
}

/// An ERC-20 token deployed on one or more networks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Display name (e.g. "USD Coin").
    #[serde(default)]
    pub name: String,

    /// Ticker symbol.
    pub symbol: String,

    /// Token decimals.
    pub decimals: u8,

    /// Price identifier (CoinGecko id).
    pub price_id: String,

    /// Stablecoin: priced at 1.00 when no source can quote it.
    #[serde(default)]
    pub stable: bool,

    /// Contract address per network key.
    #[serde(default)]
    pub addresses: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PayConfig::default();
        assert_eq!(config.gas.limit_multiplier_percent, 110);
        assert_eq!(config.gas.native_fallback_limit, 21_000);
        assert_eq!(config.rpc.probe_timeout_ms, 5000);
        assert_eq!(config.card.nfc_timeout_secs, 15);
        assert_eq!(config.payment.confirmations, 1);
        assert_eq!(config.prices.sources.len(), 4);
        assert!(config.networks.is_empty());
    }

    #[test]
    fn test_minimal_toml() {
        let config: PayConfig = toml::from_str(
            r#"
            [networks.polygon]
            name = "Polygon"
            chain_id = 137
            symbol = "MATIC"
            rpc_urls = ["https://polygon-rpc.com"]
            price_id = "matic-network"

            [tokens.usdc]
            symbol = "USDC"
            decimals = 6
            price_id = "usd-coin"
            stable = true
            addresses = { polygon = "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359" }
            "#,
        )
        .unwrap();

        let polygon = config.network("polygon").unwrap();
        assert_eq!(polygon.chain_id, 137);
        assert!(!polygon.high_gas);
        assert!(polygon.gas_oracle_url.is_none());
        assert_eq!(config.token("usdc").unwrap().decimals, 6);
        assert_eq!(config.gas.token_fallback_limit, 65_000);
    }

    #[test]
    fn test_price_source_names() {
        let config: PriceConfig = toml::from_str(r#"sources = ["binance", "coingecko"]"#).unwrap();
        assert_eq!(
            config.sources,
            vec![PriceSourceKind::Binance, PriceSourceKind::CoinGecko]
        );
    }

    #[test]
    fn test_tx_url() {
        let mut network: NetworkConfig = toml::from_str(
            r#"
            name = "Base"
            chain_id = 8453
            symbol = "ETH"
            rpc_urls = []
            price_id = "ethereum"
            explorer = "https://basescan.org/"
            "#,
        )
        .unwrap();
        assert_eq!(
            network.tx_url("0xabc").as_deref(),
            Some("https://basescan.org/tx/0xabc")
        );
        network.explorer.clear();
        assert!(network.tx_url("0xabc").is_none());
    }
}
