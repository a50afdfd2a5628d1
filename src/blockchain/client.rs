//! Blockchain RPC client with endpoint selection, timeouts and error handling.
//!
//! # Responsibilities
//! - Probe the configured endpoints in order and bind to the first reachable one
//! - Query chain state (balances, nonces, gas, receipts)
//! - Sign and broadcast raw transactions
//! - Bound every call with the request timeout
//!
//! # Design Decisions
//! - `ChainRpc` is the seam the transaction builder and payment flow use, so
//!   they can run against an in-memory chain in tests
//! - Endpoint selection happens once per client; a failing endpoint after
//!   selection surfaces as an error instead of silently switching nodes

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::contracts::{decode_address_word, namehash, IERC20, IEnsRegistry, IEnsResolver, ENS_REGISTRY};
use crate::blockchain::types::{BlockchainError, BlockchainResult, ReceiptSummary};
use crate::blockchain::wallet::Wallet;
use crate::config::{NetworkConfig, RpcConfig};
use crate::resilience::{first_success, with_timeout, TimeoutError};

/// Fee-market suggestion: `(max_fee_per_gas, max_priority_fee_per_gas)` in wei.
pub type FeeMarket = (u128, u128);

/// Chain access used by the payment pipeline.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> BlockchainResult<u64>;

    async fn block_number(&self) -> BlockchainResult<u64>;

    async fn balance(&self, address: Address) -> BlockchainResult<U256>;

    /// ERC-20 `balanceOf(owner)`.
    async fn token_balance(&self, token: Address, owner: Address) -> BlockchainResult<U256>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> BlockchainResult<u64>;

    async fn fee_market(&self) -> BlockchainResult<FeeMarket>;

    async fn gas_price(&self) -> BlockchainResult<u128>;

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64>;

    /// Sign `tx` with `wallet` and broadcast it. The request must be complete.
    async fn send_transaction(&self, wallet: &Wallet, tx: TransactionRequest) -> BlockchainResult<TxHash>;

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>>;

    /// Resolve an ENS name through the registry.
    async fn resolve_ens(&self, name: &str) -> BlockchainResult<Address>;
}

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Build one provider per URL, skipping unparsable ones.
fn build_providers(urls: &[String]) -> Vec<(String, DynProvider)> {
    let mut providers = Vec::new();
    for url_str in urls {
        match url_str.parse::<url::Url>() {
            Ok(url) => providers.push((
                url_str.clone(),
                Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider,
            )),
            Err(e) => tracing::warn!(url = %url_str, error = %e, "Ignoring invalid RPC URL"),
        }
    }
    providers
}

/// Blockchain RPC client bound to a single, probed endpoint.
#[derive(Clone)]
pub struct BlockchainClient {
    provider: DynProvider,
    /// Endpoint URL the client is bound to.
    endpoint: String,
    /// Position of the endpoint in the configured list.
    endpoint_idx: usize,
    /// Chain ID from configuration.
    chain_id: u64,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Probe `network.rpc_urls` in order and bind to the first that answers
    /// `eth_blockNumber` within the probe timeout. Later URLs are never contacted.
    pub async fn connect(network: &NetworkConfig, rpc: &RpcConfig) -> BlockchainResult<Self> {
        let providers = build_providers(&network.rpc_urls);
        let probe_timeout = Duration::from_millis(rpc.probe_timeout_ms);

        let (endpoint_idx, block) = first_success(&providers, probe_timeout, |(_, provider)| {
            let provider = provider.clone();
            async move { provider.get_block_number().await }
        })
        .await
        .map_err(BlockchainError::AllEndpointsFailed)?;

        let (endpoint, provider) = providers[endpoint_idx].clone();
        let client = Self {
            provider,
            endpoint,
            endpoint_idx,
            chain_id: network.chain_id,
            timeout_duration: Duration::from_secs(rpc.request_timeout_secs),
        };

        // Verify chain ID matches configuration
        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    network = %network.name,
                    endpoint_idx = endpoint_idx,
                    block = block,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    network = %network.name,
                    endpoint_idx = endpoint_idx,
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
                // Don't fail initialization - allow graceful degradation
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let actual = self.chain_id().await?;
        if actual != self.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// URL of the selected endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Index of the selected endpoint in the configured list.
    pub fn endpoint_idx(&self) -> usize {
        self.endpoint_idx
    }

    /// Run one RPC call under the request timeout.
    async fn call<T, E, F>(&self, method: &'static str, fut: F) -> BlockchainResult<T>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match with_timeout(self.timeout_duration, fut.into_future()).await {
            Ok(value) => Ok(value),
            Err(TimeoutError::Elapsed(d)) => {
                tracing::warn!(method = method, "RPC timeout");
                Err(BlockchainError::Timeout(d.as_secs()))
            }
            Err(TimeoutError::Inner(e)) => {
                tracing::warn!(method = method, error = %e, "RPC error");
                Err(BlockchainError::Rpc(format!("{}: {}", method, e)))
            }
        }
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> BlockchainResult<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.call("eth_call", self.provider.call(tx)).await
    }
}

#[async_trait]
impl ChainRpc for BlockchainClient {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        self.call("eth_chainId", self.provider.get_chain_id()).await
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.call("eth_blockNumber", self.provider.get_block_number()).await
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.call("eth_getBalance", self.provider.get_balance(address)).await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> BlockchainResult<U256> {
        let data = IERC20::balanceOfCall { account: owner }.abi_encode();
        let out = self.eth_call(token, data).await?;
        if out.len() < 32 {
            return Err(BlockchainError::Rpc(format!(
                "balanceOf returned {} bytes",
                out.len()
            )));
        }
        Ok(U256::from_be_slice(&out[..32]))
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> BlockchainResult<u64> {
        self.call("eth_estimateGas", self.provider.estimate_gas(tx.clone())).await
    }

    async fn fee_market(&self) -> BlockchainResult<FeeMarket> {
        let estimate = self
            .call("eth_feeHistory", self.provider.estimate_eip1559_fees())
            .await?;
        Ok((estimate.max_fee_per_gas, estimate.max_priority_fee_per_gas))
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.call("eth_gasPrice", self.provider.get_gas_price()).await
    }

    async fn transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.call("eth_getTransactionCount", self.provider.get_transaction_count(address))
            .await
    }

    async fn send_transaction(&self, wallet: &Wallet, tx: TransactionRequest) -> BlockchainResult<TxHash> {
        let envelope = tx
            .with_from(wallet.address())
            .build(&wallet.network_wallet())
            .await
            .map_err(|e| BlockchainError::Submission(format!("signing failed: {}", e)))?;
        let raw = envelope.encoded_2718();

        let pending = match with_timeout(self.timeout_duration, self.provider.send_raw_transaction(&raw)).await {
            Ok(pending) => pending,
            Err(TimeoutError::Elapsed(d)) => {
                // The node may still have accepted it; report the hash we signed.
                tracing::warn!(tx_hash = %envelope.tx_hash(), "Broadcast timed out");
                return Err(BlockchainError::Submission(format!(
                    "broadcast of {} timed out after {} ms",
                    envelope.tx_hash(),
                    d.as_millis()
                )));
            }
            Err(TimeoutError::Inner(e)) => {
                return Err(BlockchainError::Submission(e.to_string()));
            }
        };

        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        let receipt = self
            .call("eth_getTransactionReceipt", self.provider.get_transaction_receipt(tx_hash))
            .await?;
        Ok(receipt.map(|r| ReceiptSummary {
            tx_hash,
            success: r.status(),
            block_number: r.block_number,
            gas_used: r.gas_used,
            effective_gas_price: r.effective_gas_price,
        }))
    }

    async fn resolve_ens(&self, name: &str) -> BlockchainResult<Address> {
        let node = namehash(name);

        let out = self
            .eth_call(ENS_REGISTRY, IEnsRegistry::resolverCall { node }.abi_encode())
            .await?;
        let resolver = decode_address_word(&out)
            .filter(|a| !a.is_zero())
            .ok_or_else(|| BlockchainError::EnsNotFound(name.to_string()))?;

        let out = self
            .eth_call(resolver, IEnsResolver::addrCall { node }.abi_encode())
            .await?;
        decode_address_word(&out)
            .filter(|a| !a.is_zero())
            .ok_or_else(|| BlockchainError::EnsNotFound(name.to_string()))
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("endpoint", &self.endpoint)
            .field("endpoint_idx", &self.endpoint_idx)
            .field("chain_id", &self.chain_id)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}
