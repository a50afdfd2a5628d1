//! Shared utilities for integration tests: an in-memory chain, a test
//! configuration and a provisioned card.
#![allow(dead_code)]

use alloy::primitives::{address, Address, TxHash, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tap_pay::blockchain::{BlockchainError, BlockchainResult, ChainRpc, FeeMarket, ReceiptSummary, Wallet};
use tap_pay::card::{parse_payload, CardRecord};
use tap_pay::config::{parse_config, PayConfig};
use tap_pay::secret::Pin;

/// Anvil's first account; the card below holds its key.
pub const PAYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const MERCHANT: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const USDC: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

pub const CARD_SERIAL: &str = "ABC123";
pub const CARD_PIN: &str = "4321";
/// The payer key encrypted for `CARD_SERIAL` / `CARD_PIN`.
pub const CARD_EKEY: &str = "U2FsdGVkX1+msMkOkzeCVvSowCgfX0nBfskVgdzhWS2J7cvv40YOan/7hZ+uuR1t166TEGTXNXwWhBzhMEBxwYCWgUOza3z1p99ycmHPIzy+ZCxgs0Y2l4L2DRrwK3/V";

pub const GWEI: u128 = 1_000_000_000;
pub const ETHER: u128 = 1_000_000_000_000_000_000;

/// Polygon-like network pointed at nothing; tests inject `MockChain`.
pub fn test_config() -> PayConfig {
    parse_config(&format!(
        r#"
        [payment]
        merchant_address = "{merchant}"
        min_amount = "0.0001"
        max_amount = "10.0"
        confirmations = 1
        confirmation_timeout_secs = 5
        poll_interval_ms = 10

        [gas]
        max_gas_price_gwei = 500

        [networks.polygon]
        name = "Polygon"
        chain_id = 137
        symbol = "MATIC"
        rpc_urls = ["http://127.0.0.1:8545"]
        price_id = "matic-network"
        explorer = "https://polygonscan.com"

        [networks.arbitrum]
        name = "Arbitrum"
        chain_id = 42161
        symbol = "ETH"
        rpc_urls = ["http://127.0.0.1:8546"]
        price_id = "ethereum"
        high_gas = true
        min_gas_limit = 30000

        [tokens.usdc]
        symbol = "USDC"
        decimals = 6
        price_id = "usd-coin"
        stable = true
        addresses = {{ polygon = "{usdc}" }}
        "#,
        merchant = MERCHANT,
        usdc = USDC,
    ))
    .unwrap()
}

/// Card as read from the tag, address included.
pub fn card() -> CardRecord {
    let json = serde_json::json!({
        "addr": PAYER.to_string(),
        "ekey": CARD_EKEY,
        "serial": CARD_SERIAL,
    });
    parse_payload(json.to_string().as_bytes(), None).unwrap()
}

pub fn pin() -> Pin {
    Pin::parse(CARD_PIN).unwrap()
}

/// How the mock chain answers receipt queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mining {
    /// Receipt appears at the block current at broadcast.
    Mined,
    /// Receipt appears with a failed status.
    Reverted,
    /// No receipt ever appears.
    Never,
}

/// Mutable chain state behind `MockChain`.
#[derive(Debug)]
pub struct ChainState {
    pub block: u64,
    pub balances: HashMap<Address, U256>,
    pub token_balances: HashMap<(Address, Address), U256>,
    /// `None` makes `eth_estimateGas` fail.
    pub estimate: Option<u64>,
    /// `None` makes the fee market query fail.
    pub fee_market: Option<FeeMarket>,
    /// `None` makes `eth_gasPrice` fail.
    pub gas_price: Option<u128>,
    pub nonce: u64,
    pub mining: Mining,
    pub reject_send: bool,
    pub ens: HashMap<String, Address>,
    pub sent: Vec<TransactionRequest>,
    pub mined_at: HashMap<TxHash, (u64, TransactionRequest)>,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            block: 100,
            balances: HashMap::new(),
            token_balances: HashMap::new(),
            estimate: Some(21_000),
            fee_market: Some((30 * GWEI, 2 * GWEI)),
            gas_price: Some(25 * GWEI),
            nonce: 7,
            mining: Mining::Mined,
            reject_send: false,
            ens: HashMap::new(),
            sent: Vec::new(),
            mined_at: HashMap::new(),
        }
    }
}

/// In-memory `ChainRpc`. Every `block_number` call advances the head by one.
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mutate the chain state.
    pub fn with<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn fund(&self, who: Address, wei: u128) {
        self.with(|s| s.balances.insert(who, U256::from(wei)));
    }

    pub fn fund_token(&self, token: Address, who: Address, units: u128) {
        self.with(|s| s.token_balances.insert((token, who), U256::from(units)));
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.with(|s| s.sent.clone())
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        Ok(137)
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        Ok(self.with(|s| {
            let current = s.block;
            s.block += 1;
            current
        }))
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        Ok(self.with(|s| s.balances.get(&address).copied().unwrap_or_default()))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> BlockchainResult<U256> {
        Ok(self.with(|s| s.token_balances.get(&(token, owner)).copied().unwrap_or_default()))
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> BlockchainResult<u64> {
        self.with(|s| s.estimate)
            .ok_or_else(|| BlockchainError::Rpc("execution reverted".to_string()))
    }

    async fn fee_market(&self) -> BlockchainResult<FeeMarket> {
        self.with(|s| s.fee_market)
            .ok_or_else(|| BlockchainError::Rpc("method not supported".to_string()))
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.with(|s| s.gas_price)
            .ok_or_else(|| BlockchainError::Rpc("eth_gasPrice unavailable".to_string()))
    }

    async fn transaction_count(&self, _address: Address) -> BlockchainResult<u64> {
        Ok(self.with(|s| s.nonce))
    }

    async fn send_transaction(&self, _wallet: &Wallet, tx: TransactionRequest) -> BlockchainResult<TxHash> {
        self.with(|s| {
            if s.reject_send {
                return Err(BlockchainError::Submission("nonce too low".to_string()));
            }
            let hash = B256::with_last_byte(s.sent.len() as u8 + 1);
            s.sent.push(tx.clone());
            s.mined_at.insert(hash, (s.block, tx));
            s.nonce += 1;
            Ok(hash)
        })
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        Ok(self.with(|s| {
            if s.mining == Mining::Never {
                return None;
            }
            let (block, tx) = s.mined_at.get(&tx_hash)?;
            Some(ReceiptSummary {
                tx_hash,
                success: s.mining == Mining::Mined,
                block_number: Some(*block),
                gas_used: 21_000,
                effective_gas_price: tx.gas_price.or(tx.max_fee_per_gas).unwrap_or_default(),
            })
        }))
    }

    async fn resolve_ens(&self, name: &str) -> BlockchainResult<Address> {
        self.with(|s| s.ens.get(name).copied())
            .ok_or_else(|| BlockchainError::EnsNotFound(name.to_string()))
    }
}
