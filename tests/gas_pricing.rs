//! Gas limit fallbacks and the gas price ladder.

use alloy::primitives::U256;
use httpmock::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use tap_pay::blockchain::{BlockchainError, GasPriceSource, GasStrategy, Transfer, TxBuilder};
use tap_pay::oracle::GasOracleClient;

mod common;
use common::*;

fn builder(chain: &Arc<MockChain>, network: &str) -> TxBuilder {
    let config = test_config();
    TxBuilder::new(
        chain.clone(),
        config.network(network).unwrap().clone(),
        config.gas.clone(),
        config.payment.clone(),
    )
}

fn native() -> Transfer {
    Transfer::Native {
        to: MERCHANT,
        value: U256::from(1u64),
    }
}

fn token() -> Transfer {
    Transfer::Token {
        contract: USDC,
        to: MERCHANT,
        amount: U256::from(1u64),
    }
}

fn oracle(server: &MockServer) -> Arc<GasOracleClient> {
    Arc::new(GasOracleClient::new(
        server.url("/v2/api"),
        Some("TESTKEY".to_string()),
        Duration::from_secs(2),
    ))
}

#[tokio::test]
async fn test_estimate_gets_safety_margin() {
    let chain = MockChain::new();
    chain.with(|s| s.estimate = Some(50_000));
    let (limit, fallback) = builder(&chain, "polygon").estimate_gas_limit(PAYER, &token()).await;
    assert_eq!(limit, 55_000);
    assert!(!fallback);
}

#[tokio::test]
async fn test_fallback_limits() {
    let chain = MockChain::new();
    chain.with(|s| s.estimate = None);
    let polygon = builder(&chain, "polygon");

    assert_eq!(polygon.estimate_gas_limit(PAYER, &native()).await, (21_000, true));
    assert_eq!(polygon.estimate_gas_limit(PAYER, &token()).await, (65_000, true));

    // High-gas networks use the larger fallback for every transfer kind.
    let arbitrum = builder(&chain, "arbitrum");
    assert_eq!(arbitrum.estimate_gas_limit(PAYER, &native()).await, (100_000, true));
}

#[tokio::test]
async fn test_network_floor_applies_to_estimates() {
    let chain = MockChain::new();
    // 21000 + 10% is below Arbitrum's 30000 floor.
    let (limit, fallback) = builder(&chain, "arbitrum").estimate_gas_limit(PAYER, &native()).await;
    assert_eq!(limit, 30_000);
    assert!(!fallback);
}

#[tokio::test]
async fn test_oracle_price_is_used_first() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/api").query_param("apikey", "TESTKEY");
            then.status(200).json_body(serde_json::json!({
                "status": "1",
                "message": "OK",
                "result": {"SafeGasPrice": "20", "ProposeGasPrice": "31", "FastGasPrice": "40"}
            }));
        })
        .await;

    let chain = MockChain::new();
    let estimate = builder(&chain, "polygon")
        .with_oracle(oracle(&server))
        .estimate(PAYER, &native())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(estimate.strategy, GasStrategy::Legacy);
    assert_eq!(estimate.price_source, GasPriceSource::Oracle);
    assert_eq!(estimate.gas_price, 25_500_000_000);
    assert!(estimate.max_fee_per_gas.is_none());
    assert_eq!(estimate.total_cost, U256::from(23_100u128 * 25_500_000_000));
}

#[tokio::test]
async fn test_oracle_error_status_falls_through_to_fee_market() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/api");
            then.status(200).json_body(serde_json::json!({
                "status": "0",
                "message": "NOTOK",
                "result": "Invalid API Key"
            }));
        })
        .await;

    let chain = MockChain::new();
    let estimate = builder(&chain, "polygon")
        .with_oracle(oracle(&server))
        .estimate(PAYER, &native())
        .await
        .unwrap();

    assert_eq!(estimate.strategy, GasStrategy::Eip1559);
    assert_eq!(estimate.price_source, GasPriceSource::FeeMarket);
    assert_eq!(estimate.max_fee_per_gas, Some(30 * GWEI));
    assert_eq!(estimate.max_priority_fee_per_gas, Some(2 * GWEI));
    // Cost is bounded by max fee.
    assert_eq!(estimate.total_cost, U256::from(23_100u128 * 30 * GWEI));
}

#[tokio::test]
async fn test_oracle_http_failure_falls_through() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/api");
            then.status(503);
        })
        .await;

    let chain = MockChain::new();
    chain.with(|s| s.fee_market = None);
    let estimate = builder(&chain, "polygon")
        .with_oracle(oracle(&server))
        .estimate(PAYER, &native())
        .await
        .unwrap();

    assert_eq!(estimate.strategy, GasStrategy::Legacy);
    assert_eq!(estimate.price_source, GasPriceSource::Node);
    assert_eq!(estimate.gas_price, 25 * GWEI);
}

#[tokio::test]
async fn test_no_price_anywhere() {
    let chain = MockChain::new();
    chain.with(|s| {
        s.fee_market = None;
        s.gas_price = None;
    });
    let err = builder(&chain, "polygon").estimate(PAYER, &native()).await.unwrap_err();
    assert!(matches!(err, BlockchainError::GasEstimation(_)));
}

#[tokio::test]
async fn test_gas_price_ceiling() {
    let chain = MockChain::new();
    chain.with(|s| {
        s.fee_market = None;
        s.gas_price = Some(501 * GWEI);
    });
    let err = builder(&chain, "polygon").estimate(PAYER, &native()).await.unwrap_err();
    assert!(matches!(
        err,
        BlockchainError::GasPriceTooHigh {
            current_gwei: 501,
            max_gwei: 500
        }
    ));
}

#[tokio::test]
async fn test_gas_price_ceiling_counts_fractional_gwei() {
    let chain = MockChain::new();
    chain.with(|s| {
        s.fee_market = None;
        s.gas_price = Some(500 * GWEI + 900_000_000);
    });
    let err = builder(&chain, "polygon").estimate(PAYER, &native()).await.unwrap_err();
    assert!(matches!(
        err,
        BlockchainError::GasPriceTooHigh {
            current_gwei: 501,
            max_gwei: 500
        }
    ));

    chain.with(|s| s.gas_price = Some(500 * GWEI));
    let estimate = builder(&chain, "polygon").estimate(PAYER, &native()).await.unwrap();
    assert_eq!(estimate.gas_price, 500 * GWEI);
}

#[tokio::test]
async fn test_legacy_build_sets_gas_price_only() {
    let chain = MockChain::new();
    chain.with(|s| s.fee_market = None);
    let builder = builder(&chain, "polygon");
    let estimate = builder.estimate(PAYER, &native()).await.unwrap();

    let tx = builder.build(PAYER, &native(), &estimate, 3);
    assert_eq!(tx.gas_price, Some(25 * GWEI));
    assert!(tx.max_fee_per_gas.is_none());
    assert_eq!(tx.nonce, Some(3));
    assert_eq!(tx.chain_id, Some(137));
}
