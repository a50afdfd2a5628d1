//! Metrics collection.
//!
//! # Metrics
//! - `tap_pay_rpc_failover_total` (counter): endpoint selections past the first candidate
//! - `tap_pay_price_source_total` (counter): price lookups by source and outcome
//! - `tap_pay_gas_strategy_total` (counter): gas estimates by network and strategy
//! - `tap_pay_gas_limit_fallback_total` (counter): estimations that fell back to a fixed limit
//! - `tap_pay_payments_total` (counter): payment attempts by network and outcome
//! - `tap_pay_confirmation_seconds` (histogram): broadcast → confirmation latency
//!
//! # Design Decisions
//! - Uses the `metrics` facade; without an installed recorder every call is a no-op
//! - Labels are low-cardinality (network key, source name, outcome)

use metrics::{counter, histogram};

/// A candidate list was walked past its first entry.
pub fn record_failover(selected_index: usize) {
    counter!("tap_pay_rpc_failover_total", "selected" => selected_index.to_string()).increment(1);
}

/// A price source was consulted.
pub fn record_price_source(source: &str, success: bool) {
    let outcome = if success { "ok" } else { "rejected" };
    counter!("tap_pay_price_source_total", "source" => source.to_string(), "outcome" => outcome)
        .increment(1);
}

/// A gas estimate was produced.
pub fn record_gas_strategy(network: &str, strategy: &str) {
    counter!(
        "tap_pay_gas_strategy_total",
        "network" => network.to_string(),
        "strategy" => strategy.to_string()
    )
    .increment(1);
}

/// `eth_estimateGas` failed and a fixed limit was used.
pub fn record_gas_limit_fallback(network: &str) {
    counter!("tap_pay_gas_limit_fallback_total", "network" => network.to_string()).increment(1);
}

/// A payment attempt finished.
pub fn record_payment(network: &str, outcome: &str) {
    counter!(
        "tap_pay_payments_total",
        "network" => network.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Time between broadcast and confirmation.
pub fn record_confirmation_latency(network: &str, seconds: f64) {
    histogram!("tap_pay_confirmation_seconds", "network" => network.to_string()).record(seconds);
}
