//! Transaction building, gas estimation, signing and confirmation monitoring.
//!
//! # Responsibilities
//! - Turn a transfer into call data (native value vs ERC-20 `transfer`)
//! - Estimate the gas limit with a safety margin, or fall back to fixed limits
//! - Price gas: explorer oracle → fee market → `eth_gasPrice`
//! - Sign with an explicit nonce, broadcast once, poll for the receipt
//!
//! # Design Decisions
//! - Estimates are computed fresh for every attempt, never cached
//! - A broadcast is never retried; a confirmation timeout carries the hash
//!   and nonce so the operator can look the transaction up

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::client::ChainRpc;
use crate::blockchain::contracts::IERC20;
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, ConfirmationStatus, GasEstimate, GasPriceSource, GasStrategy,
    ReceiptSummary,
};
use crate::blockchain::wallet::Wallet;
use crate::config::{GasConfig, NetworkConfig, PaymentConfig};
use crate::observability::metrics;
use crate::oracle::GasOracle;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// What moves where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    /// Native coin `value` to `to`.
    Native { to: Address, value: U256 },
    /// ERC-20 `transfer(to, amount)` on `contract`.
    Token {
        contract: Address,
        to: Address,
        amount: U256,
    },
}

impl Transfer {
    pub fn is_token(&self) -> bool {
        matches!(self, Transfer::Token { .. })
    }

    /// Native value carried by the transaction.
    pub fn value(&self) -> U256 {
        match self {
            Transfer::Native { value, .. } => *value,
            Transfer::Token { .. } => U256::ZERO,
        }
    }

    /// Unsigned request without gas or nonce fields.
    pub fn request(&self, from: Address) -> TransactionRequest {
        match self {
            Transfer::Native { to, value } => TransactionRequest::default()
                .with_from(from)
                .with_to(*to)
                .with_value(*value),
            Transfer::Token { contract, to, amount } => {
                let data = IERC20::transferCall {
                    to: *to,
                    amount: *amount,
                }
                .abi_encode();
                TransactionRequest::default()
                    .with_from(from)
                    .with_to(*contract)
                    .with_value(U256::ZERO)
                    .with_input(data)
            }
        }
    }
}

/// A broadcast transaction awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTx {
    pub tx_hash: TxHash,
    pub nonce: u64,
}

/// Transaction builder for one network.
pub struct TxBuilder {
    rpc: Arc<dyn ChainRpc>,
    oracle: Option<Arc<dyn GasOracle>>,
    network: NetworkConfig,
    gas: GasConfig,
    payment: PaymentConfig,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        network: NetworkConfig,
        gas: GasConfig,
        payment: PaymentConfig,
    ) -> Self {
        Self {
            rpc,
            oracle: None,
            network,
            gas,
            payment,
        }
    }

    /// Consult a gas oracle before the node's own fee data.
    pub fn with_oracle(mut self, oracle: Arc<dyn GasOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Gas limit: estimate with margin, else a fixed fallback; then the network floor.
    pub async fn estimate_gas_limit(&self, from: Address, transfer: &Transfer) -> (u64, bool) {
        let request = transfer.request(from);
        let (limit, fallback) = match self.rpc.estimate_gas(&request).await {
            Ok(estimated) => {
                let limit = (estimated as u128 * self.gas.limit_multiplier_percent as u128 / 100) as u64;
                (limit, false)
            }
            Err(e) => {
                let limit = if self.network.high_gas {
                    self.gas.high_gas_fallback_limit
                } else if transfer.is_token() {
                    self.gas.token_fallback_limit
                } else {
                    self.gas.native_fallback_limit
                };
                tracing::warn!(
                    network = %self.network.name,
                    error = %e,
                    fallback_limit = limit,
                    "Gas estimation failed, using fallback limit"
                );
                metrics::record_gas_limit_fallback(&self.network.name);
                (limit, true)
            }
        };

        let floored = match self.network.min_gas_limit {
            Some(min) => limit.max(min),
            None => limit,
        };
        (floored, fallback)
    }

    /// Gas price ladder. Returns `(price_for_cost, max_fee, max_priority, strategy, source)`.
    async fn price_gas(&self) -> BlockchainResult<(u128, Option<u128>, Option<u128>, GasStrategy, GasPriceSource)> {
        if let Some(oracle) = &self.oracle {
            match oracle.suggested_gas_price().await {
                Ok(price) if price > 0 => {
                    return Ok((price, None, None, GasStrategy::Legacy, GasPriceSource::Oracle));
                }
                Ok(_) => tracing::warn!(network = %self.network.name, "Gas oracle returned zero"),
                Err(e) => tracing::warn!(network = %self.network.name, error = %e, "Gas oracle failed"),
            }
        }

        let fee_market_error = match self.rpc.fee_market().await {
            Ok((max_fee, priority)) if max_fee > 0 => {
                return Ok((
                    max_fee,
                    Some(max_fee),
                    Some(priority),
                    GasStrategy::Eip1559,
                    GasPriceSource::FeeMarket,
                ));
            }
            Ok(_) => "fee market returned zero max fee".to_string(),
            Err(e) => e.to_string(),
        };
        tracing::debug!(network = %self.network.name, reason = %fee_market_error, "No fee market data");

        match self.rpc.gas_price().await {
            Ok(price) => Ok((price, None, None, GasStrategy::Legacy, GasPriceSource::Node)),
            Err(e) => Err(BlockchainError::GasEstimation(format!(
                "fee market: {}; eth_gasPrice: {}",
                fee_market_error, e
            ))),
        }
    }

    /// Full gas estimate for a transfer.
    pub async fn estimate(&self, from: Address, transfer: &Transfer) -> BlockchainResult<GasEstimate> {
        let (gas_limit, limit_is_fallback) = self.estimate_gas_limit(from, transfer).await;
        let (gas_price, max_fee_per_gas, max_priority_fee_per_gas, strategy, price_source) =
            self.price_gas().await?;

        if gas_price > u128::from(self.gas.max_gas_price_gwei) * WEI_PER_GWEI {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: u64::try_from(gas_price.div_ceil(WEI_PER_GWEI)).unwrap_or(u64::MAX),
                max_gwei: self.gas.max_gas_price_gwei,
            });
        }

        metrics::record_gas_strategy(&self.network.name, strategy.as_str());
        tracing::debug!(
            network = %self.network.name,
            gas_limit = gas_limit,
            gas_price = gas_price,
            strategy = %strategy,
            "Gas estimated"
        );

        Ok(GasEstimate {
            gas_limit,
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            total_cost: U256::from(gas_limit) * U256::from(gas_price),
            strategy,
            price_source,
            limit_is_fallback,
        })
    }

    /// Build the complete request for signing.
    pub fn build(&self, from: Address, transfer: &Transfer, estimate: &GasEstimate, nonce: u64) -> TransactionRequest {
        let tx = transfer
            .request(from)
            .with_nonce(nonce)
            .with_chain_id(self.network.chain_id)
            .with_gas_limit(estimate.gas_limit);

        match (estimate.max_fee_per_gas, estimate.max_priority_fee_per_gas) {
            (Some(max_fee), Some(priority)) => tx
                .with_max_fee_per_gas(max_fee)
                .with_max_priority_fee_per_gas(priority),
            _ => tx.with_gas_price(estimate.gas_price),
        }
    }

    /// Next nonce for `from`, read from the chain.
    pub async fn next_nonce(&self, from: Address) -> BlockchainResult<u64> {
        self.rpc.transaction_count(from).await
    }

    /// Fetch the nonce, sign and broadcast once.
    pub async fn submit(&self, wallet: &Wallet, transfer: &Transfer, estimate: &GasEstimate) -> BlockchainResult<SubmittedTx> {
        let nonce = self.next_nonce(wallet.address()).await?;
        self.submit_with_nonce(wallet, transfer, estimate, nonce).await
    }

    /// Sign with an explicit nonce and broadcast once.
    pub async fn submit_with_nonce(
        &self,
        wallet: &Wallet,
        transfer: &Transfer,
        estimate: &GasEstimate,
        nonce: u64,
    ) -> BlockchainResult<SubmittedTx> {
        let tx = self.build(wallet.address(), transfer, estimate, nonce);

        let tx_hash = self.rpc.send_transaction(wallet, tx).await?;
        tracing::info!(
            network = %self.network.name,
            tx_hash = %tx_hash,
            nonce = nonce,
            strategy = %estimate.strategy,
            "Transaction broadcast"
        );
        Ok(SubmittedTx { tx_hash, nonce })
    }

    /// Check a transaction's confirmation depth once.
    pub async fn confirmation_status(&self, tx_hash: TxHash) -> BlockchainResult<ConfirmationStatus> {
        let receipt = match self.rpc.transaction_receipt(tx_hash).await? {
            Some(r) => r,
            None => return Ok(ConfirmationStatus::Pending),
        };

        if !receipt.success {
            return Err(BlockchainError::Reverted(tx_hash));
        }

        let required = self.payment.confirmations.max(1);
        let Some(tx_block) = receipt.block_number else {
            return Ok(ConfirmationStatus::Pending);
        };
        let current_block = self.rpc.block_number().await?;
        let confirmations = current_block.saturating_sub(tx_block) + 1;

        if confirmations >= required {
            Ok(ConfirmationStatus::Confirmed(receipt))
        } else {
            Ok(ConfirmationStatus::Confirming {
                current: confirmations,
                required,
            })
        }
    }

    /// Poll until the transaction has the configured confirmations.
    pub async fn wait_for_confirmation(&self, submitted: SubmittedTx) -> BlockchainResult<ReceiptSummary> {
        let timeout_duration = Duration::from_secs(self.payment.confirmation_timeout_secs);
        let poll_interval = Duration::from_millis(self.payment.poll_interval_ms.max(1));
        let started = Instant::now();
        let tx_hash = submitted.tx_hash;

        let result = timeout(timeout_duration, async {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match self.confirmation_status(tx_hash).await {
                    Ok(ConfirmationStatus::Confirmed(receipt)) => return Ok(receipt),
                    Ok(ConfirmationStatus::Pending) => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    }
                    Ok(ConfirmationStatus::Confirming { current, required }) => {
                        tracing::debug!(
                            tx_hash = %tx_hash,
                            confirmations = current,
                            required = required,
                            "Waiting for confirmations"
                        );
                    }
                    Err(e @ BlockchainError::Reverted(_)) => return Err(e),
                    // Already broadcast: keep polling through RPC hiccups.
                    Err(e) => tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed"),
                }
            }
        })
        .await;

        match result {
            Ok(Ok(receipt)) => {
                metrics::record_confirmation_latency(&self.network.name, started.elapsed().as_secs_f64());
                Ok(receipt)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BlockchainError::ConfirmationTimeout {
                tx_hash,
                nonce: submitted.nonce,
                waited_secs: timeout_duration.as_secs(),
            }),
        }
    }
}
