//! Spot price aggregation across public price APIs.
//!
//! # Responsibilities
//! - Query sources strictly in priority order
//! - Accept an answer only if it prices every requested asset
//! - Never merge answers from different sources
//! - Fall back to fixed defaults (stablecoins 1.00, everything else unknown)

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PayConfig, PriceConfig, PriceSourceKind};
use crate::observability::metrics;
use crate::oracle::{http_client, PriceError, PriceResult};

/// Source name reported when every provider failed.
pub const DEFAULT_SOURCE: &str = "default";

/// An asset to price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceAsset {
    /// CoinGecko id; also the key of the result map.
    pub id: String,
    /// Ticker symbol (ETH, MATIC, USDC).
    pub symbol: String,
    pub stable: bool,
}

impl PriceAsset {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, stable: bool) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            stable,
        }
    }

    /// Every native asset and token in the registry, deduplicated by id.
    pub fn from_config(config: &PayConfig) -> Vec<PriceAsset> {
        let mut assets: Vec<PriceAsset> = Vec::new();
        let networks = config
            .networks
            .values()
            .map(|n| PriceAsset::new(&n.price_id, &n.symbol, false));
        let tokens = config
            .tokens
            .values()
            .map(|t| PriceAsset::new(&t.price_id, &t.symbol, t.stable));
        for asset in networks.chain(tokens) {
            if !assets.iter().any(|a| a.id == asset.id) {
                assets.push(asset);
            }
        }
        assets
    }
}

/// USD prices from a single source.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSet {
    pub source: String,
    pub prices: BTreeMap<String, f64>,
}

impl PriceSet {
    /// USD price of an asset; 0.0 means unknown.
    pub fn usd(&self, asset_id: &str) -> f64 {
        self.prices.get(asset_id).copied().unwrap_or(0.0)
    }

    pub fn is_default(&self) -> bool {
        self.source == DEFAULT_SOURCE
    }
}

/// One price API.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// USD prices keyed by asset id. May be partial; the aggregator decides.
    async fn fetch(&self, assets: &[PriceAsset]) -> PriceResult<HashMap<String, f64>>;
}

/// Walks sources in order and returns the first complete answer.
pub struct PriceAggregator {
    sources: Vec<Arc<dyn PriceSource>>,
}

impl PriceAggregator {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self { sources }
    }

    /// Build the configured sources in priority order.
    pub fn from_config(config: &PriceConfig) -> Self {
        let http = http_client(Duration::from_secs(config.timeout_secs));
        let sources = config
            .sources
            .iter()
            .map(|kind| -> Arc<dyn PriceSource> {
                match kind {
                    PriceSourceKind::CoinGecko => Arc::new(CoinGecko::new(http.clone(), &config.coingecko_url)),
                    PriceSourceKind::CryptoCompare => {
                        Arc::new(CryptoCompare::new(http.clone(), &config.cryptocompare_url))
                    }
                    PriceSourceKind::Binance => Arc::new(Binance::new(http.clone(), &config.binance_url)),
                    PriceSourceKind::Coinbase => Arc::new(Coinbase::new(http.clone(), &config.coinbase_url)),
                }
            })
            .collect();
        Self::new(sources)
    }

    /// Price every asset from one source, or fall back to defaults.
    pub async fn fetch(&self, assets: &[PriceAsset]) -> PriceSet {
        for source in &self.sources {
            let outcome = source
                .fetch(assets)
                .await
                .and_then(|prices| complete(source.name(), assets, prices));

            match outcome {
                Ok(prices) => {
                    metrics::record_price_source(source.name(), true);
                    tracing::debug!(source = source.name(), assets = assets.len(), "Prices fetched");
                    return PriceSet {
                        source: source.name().to_string(),
                        prices,
                    };
                }
                Err(e) => {
                    metrics::record_price_source(source.name(), false);
                    tracing::warn!(source = source.name(), error = %e, "Price source rejected, trying next");
                }
            }
        }

        tracing::warn!("All price sources failed, using defaults");
        PriceSet {
            source: DEFAULT_SOURCE.to_string(),
            prices: assets
                .iter()
                .map(|a| (a.id.clone(), if a.stable { 1.0 } else { 0.0 }))
                .collect(),
        }
    }
}

/// Keep only requested assets and require a usable price for each.
fn complete(
    source_name: &str,
    assets: &[PriceAsset],
    mut prices: HashMap<String, f64>,
) -> PriceResult<BTreeMap<String, f64>> {
    let mut accepted = BTreeMap::new();
    let mut missing = Vec::new();
    for asset in assets {
        match prices.remove(&asset.id) {
            Some(p) if p.is_finite() && p > 0.0 => {
                accepted.insert(asset.id.clone(), p);
            }
            _ => missing.push(asset.id.clone()),
        }
    }
    if missing.is_empty() {
        Ok(accepted)
    } else {
        Err(PriceError::Incomplete {
            source_name: source_name.to_string(),
            missing,
        })
    }
}

fn http_err(source: &str, e: reqwest::Error) -> PriceError {
    PriceError::Http {
        source_name: source.to_string(),
        reason: e.to_string(),
    }
}

fn parse_err(source: &str, reason: impl std::fmt::Display) -> PriceError {
    PriceError::Parse {
        source_name: source.to_string(),
        reason: reason.to_string(),
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    source: &str,
    request: reqwest::RequestBuilder,
) -> PriceResult<T> {
    request
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| http_err(source, e))?
        .json()
        .await
        .map_err(|e| parse_err(source, e))
}

/// CoinGecko `/api/v3/simple/price`.
pub struct CoinGecko {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGecko {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for CoinGecko {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch(&self, assets: &[PriceAsset]) -> PriceResult<HashMap<String, f64>> {
        let ids = assets.iter().map(|a| a.id.as_str()).collect::<Vec<_>>().join(",");
        let request = self
            .http
            .get(format!("{}/api/v3/simple/price", self.base_url))
            .query(&[("ids", ids.as_str()), ("vs_currencies", "usd")]);

        let body: HashMap<String, HashMap<String, f64>> = get_json(self.name(), request).await?;
        Ok(body
            .into_iter()
            .filter_map(|(id, quote)| quote.get("usd").map(|p| (id, *p)))
            .collect())
    }
}

/// CryptoCompare `/data/pricemulti`, keyed by symbol.
pub struct CryptoCompare {
    http: reqwest::Client,
    base_url: String,
}

impl CryptoCompare {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for CryptoCompare {
    fn name(&self) -> &'static str {
        "cryptocompare"
    }

    async fn fetch(&self, assets: &[PriceAsset]) -> PriceResult<HashMap<String, f64>> {
        let symbols = assets.iter().map(|a| a.symbol.as_str()).collect::<Vec<_>>().join(",");
        let request = self
            .http
            .get(format!("{}/data/pricemulti", self.base_url))
            .query(&[("fsyms", symbols.as_str()), ("tsyms", "USD")]);

        // Errors come back as {"Response": "Error", ...}; the quote map
        // deserialization below rejects them.
        let body: HashMap<String, HashMap<String, f64>> = get_json(self.name(), request).await?;
        Ok(assets
            .iter()
            .filter_map(|a| {
                body.get(&a.symbol)
                    .and_then(|q| q.get("USD"))
                    .map(|p| (a.id.clone(), *p))
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct BinanceTicker {
    price: String,
}

/// Binance `/api/v3/ticker/price` against USDT. Stablecoins are not quoted
/// and are filled at 1.00.
pub struct Binance {
    http: reqwest::Client,
    base_url: String,
}

impl Binance {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for Binance {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn fetch(&self, assets: &[PriceAsset]) -> PriceResult<HashMap<String, f64>> {
        let mut prices = HashMap::new();
        for asset in assets {
            if asset.stable {
                prices.insert(asset.id.clone(), 1.0);
                continue;
            }
            let request = self
                .http
                .get(format!("{}/api/v3/ticker/price", self.base_url))
                .query(&[("symbol", format!("{}USDT", asset.symbol.to_uppercase()))]);
            let ticker: BinanceTicker = get_json(self.name(), request).await?;
            let price = ticker.price.parse::<f64>().map_err(|e| parse_err(self.name(), e))?;
            prices.insert(asset.id.clone(), price);
        }
        Ok(prices)
    }
}

#[derive(Deserialize)]
struct CoinbaseSpot {
    data: CoinbaseAmount,
}

#[derive(Deserialize)]
struct CoinbaseAmount {
    amount: String,
}

/// Coinbase `/v2/prices/{SYM}-USD/spot`. Stablecoins are filled at 1.00.
pub struct Coinbase {
    http: reqwest::Client,
    base_url: String,
}

impl Coinbase {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for Coinbase {
    fn name(&self) -> &'static str {
        "coinbase"
    }

    async fn fetch(&self, assets: &[PriceAsset]) -> PriceResult<HashMap<String, f64>> {
        let mut prices = HashMap::new();
        for asset in assets {
            if asset.stable {
                prices.insert(asset.id.clone(), 1.0);
                continue;
            }
            let url = format!(
                "{}/v2/prices/{}-USD/spot",
                self.base_url,
                asset.symbol.to_uppercase()
            );
            // A missing pair only leaves a gap; the aggregator rejects the answer.
            match get_json::<CoinbaseSpot>(self.name(), self.http.get(url)).await {
                Ok(spot) => {
                    let price = spot.data.amount.parse::<f64>().map_err(|e| parse_err(self.name(), e))?;
                    prices.insert(asset.id.clone(), price);
                }
                Err(e) => tracing::debug!(symbol = %asset.symbol, error = %e, "Coinbase pair unavailable"),
            }
        }
        Ok(prices)
    }
}
