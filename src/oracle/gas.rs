//! Block-explorer gas oracle (Etherscan `gastracker/gasoracle` shape).
//!
//! Response: `{"status": "1", "message": "OK", "result": {"SafeGasPrice": "…",
//! "ProposeGasPrice": "…", "FastGasPrice": "…"}}`, prices in gwei as decimal
//! strings. The suggested price is the mean of Propose and Safe (Safe
//! defaults to Propose), rounded to two decimals of gwei.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::oracle::{http_client, OracleError, OracleResult};

const WEI_PER_CENTI_GWEI: u128 = 10_000_000;

/// Source of a suggested legacy gas price.
#[async_trait]
pub trait GasOracle: Send + Sync {
    /// Suggested gas price in wei.
    async fn suggested_gas_price(&self) -> OracleResult<u128>;
}

#[derive(Debug, Deserialize)]
struct OracleResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GasPrices {
    #[serde(default)]
    safe_gas_price: Option<String>,
    propose_gas_price: String,
}

/// HTTP gas oracle client.
#[derive(Debug, Clone)]
pub struct GasOracleClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl GasOracleClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl GasOracle for GasOracleClient {
    async fn suggested_gas_price(&self) -> OracleResult<u128> {
        let mut request = self.http.get(&self.url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key)]);
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OracleError::Http(e.to_string()))?;
        let body: OracleResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        parse_oracle_response(body)
    }
}

fn parse_oracle_response(body: OracleResponse) -> OracleResult<u128> {
    if body.status != "1" {
        return Err(OracleError::Status {
            status: body.status,
            message: body
                .message
                .or_else(|| body.result.as_str().map(str::to_string))
                .unwrap_or_default(),
        });
    }

    let prices: GasPrices =
        serde_json::from_value(body.result).map_err(|e| OracleError::Parse(e.to_string()))?;

    let propose = parse_gwei(&prices.propose_gas_price)?;
    let safe = match prices.safe_gas_price.as_deref() {
        Some(raw) => parse_gwei(raw)?,
        None => propose,
    };

    Ok(gwei_to_wei_rounded((propose + safe) / 2.0))
}

fn parse_gwei(raw: &str) -> OracleResult<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| OracleError::Parse(format!("gas price '{}' is not a number", raw)))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(OracleError::Parse(format!("gas price '{}' out of range", raw)));
    }
    Ok(value)
}

/// Round to two decimals of gwei, then convert to wei.
fn gwei_to_wei_rounded(gwei: f64) -> u128 {
    (gwei * 100.0).round() as u128 * WEI_PER_CENTI_GWEI
}
