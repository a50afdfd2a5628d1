//! Payment orchestration: card → secret → estimate → preview → submit.
//!
//! # Data Flow
//! ```text
//! prepare(card, pin, intent)
//!     → secret::resolve (PIN check, decrypt, shape check)
//!     → Wallet (card address must match the key)
//!     → recipient + asset + amount resolution
//!     → TxBuilder::estimate → sufficiency checks
//!     → PreparedPayment { preview, … }
//! confirm(prepared, cancel)
//!     → nonce (cancellable) → sign + broadcast (not cancellable) → confirmations
//!     → PaymentReceipt
//! ```
//!
//! # Design Decisions
//! - The decrypted key never outlives `prepare`; only the signer travels on,
//!   inside `PreparedPayment`, and is wiped when that is dropped
//! - Cancellation is honoured up to the broadcast and never after it
//! - Every flow runs in a tracing span carrying a per-payment UUID

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, TxHash, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

use crate::blockchain::{
    BlockchainClient, ChainRpc, GasEstimate, GasStrategy, Transfer, TxBuilder, Wallet,
};
use crate::card::CardRecord;
use crate::config::{NetworkConfig, PayConfig};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::oracle::{GasOracleClient, PriceAggregator, PriceAsset, PriceSet};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::intent::{parse_amount, resolve_asset, ResolvedAsset, TransactionIntent};
use crate::payments::sufficiency::{check_native, check_token};
use crate::secret::{Pin, SecretResolver};

/// What the operator sees before confirming.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPreview {
    pub network: String,
    pub from: Address,
    pub recipient: Address,
    pub amount: String,
    pub symbol: String,
    pub native_symbol: String,
    pub gas_limit: u64,
    pub gas_price_gwei: String,
    /// Gas bound in native units.
    pub total_gas: String,
    pub strategy: GasStrategy,
    pub amount_usd: f64,
    pub gas_usd: f64,
    pub total_usd: f64,
    /// Source of the USD figures.
    pub price_source: String,
}

/// A checked payment, ready to sign. Dropping it wipes the signing key.
pub struct PreparedPayment {
    pub id: Uuid,
    pub preview: PaymentPreview,
    wallet: Wallet,
    transfer: Transfer,
    estimate: GasEstimate,
}

impl PreparedPayment {
    pub fn estimate(&self) -> &GasEstimate {
        &self.estimate
    }
}

impl std::fmt::Debug for PreparedPayment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedPayment")
            .field("id", &self.id)
            .field("preview", &self.preview)
            .finish_non_exhaustive()
    }
}

/// Outcome of a confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub id: Uuid,
    pub tx_hash: TxHash,
    pub nonce: u64,
    /// Gas used × effective gas price, in wei.
    pub fee_paid: U256,
    pub block_number: Option<u64>,
    pub strategy: GasStrategy,
    pub explorer_url: Option<String>,
}

/// One balance line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBalance {
    pub asset: String,
    pub symbol: String,
    pub decimals: u8,
    pub amount: U256,
}

impl AssetBalance {
    pub fn formatted(&self) -> String {
        format_amount(self.amount, self.decimals)
    }
}

/// Payment pipeline bound to one network.
pub struct PaymentFlow {
    config: Arc<PayConfig>,
    network_key: String,
    network: NetworkConfig,
    rpc: Arc<dyn ChainRpc>,
    builder: TxBuilder,
    prices: Option<Arc<PriceAggregator>>,
    resolver: SecretResolver,
}

impl PaymentFlow {
    /// Select an RPC endpoint for `network_key` and build the flow on it.
    pub async fn connect(config: Arc<PayConfig>, network_key: &str) -> PaymentResult<Self> {
        let network = config
            .network(network_key)
            .ok_or_else(|| PaymentError::UnknownNetwork(network_key.to_string()))?;
        let client = BlockchainClient::connect(network, &config.rpc).await?;
        let prices = Arc::new(PriceAggregator::from_config(&config.prices));
        Ok(Self::new(config, network_key, Arc::new(client))?.with_prices(prices))
    }

    /// Build the flow on an existing chain connection.
    pub fn new(config: Arc<PayConfig>, network_key: &str, rpc: Arc<dyn ChainRpc>) -> PaymentResult<Self> {
        let network = config
            .network(network_key)
            .cloned()
            .ok_or_else(|| PaymentError::UnknownNetwork(network_key.to_string()))?;

        let mut builder = TxBuilder::new(
            rpc.clone(),
            network.clone(),
            config.gas.clone(),
            config.payment.clone(),
        );
        if let Some(url) = &network.gas_oracle_url {
            builder = builder.with_oracle(Arc::new(GasOracleClient::new(
                url.clone(),
                config.gas.oracle_api_key.clone(),
                Duration::from_secs(config.gas.oracle_timeout_secs),
            )));
        }

        Ok(Self {
            network_key: network_key.to_string(),
            network,
            rpc,
            builder,
            prices: None,
            resolver: SecretResolver::cryptojs(),
            config,
        })
    }

    /// Attach a price aggregator for USD figures.
    pub fn with_prices(mut self, prices: Arc<PriceAggregator>) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn builder(&self) -> &TxBuilder {
        &self.builder
    }

    /// Hex address as-is; `*.eth` through ENS; empty means the merchant.
    pub async fn resolve_recipient(&self, recipient: &str) -> PaymentResult<Address> {
        let recipient = match recipient.trim() {
            "" => self.config.payment.merchant_address.trim(),
            other => other,
        };
        if recipient.is_empty() {
            return Err(PaymentError::InvalidRecipient(String::new()));
        }
        if recipient.ends_with(".eth") {
            let address = self.rpc.resolve_ens(recipient).await?;
            tracing::debug!(name = %recipient, address = %address, "ENS name resolved");
            return Ok(address);
        }
        recipient
            .parse::<Address>()
            .map_err(|_| PaymentError::InvalidRecipient(recipient.to_string()))
    }

    /// Decrypt the card, check funds and build a preview.
    pub async fn prepare(
        &self,
        card: &CardRecord,
        pin: &Pin,
        intent: &TransactionIntent,
    ) -> PaymentResult<PreparedPayment> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!(
            "payment",
            payment_id = %id,
            network = %self.network_key,
            asset = %intent.asset
        );

        let result = async {
            let secret = self.resolver.resolve(&card.encrypted_key, pin, &card.serial)?;
            let wallet = Wallet::from_secret(&secret, self.network.chain_id)?;
            drop(secret);

            if let Some(card_address) = card.address {
                if card_address != wallet.address() {
                    return Err(PaymentError::AddressMismatch {
                        card: card_address,
                        key: wallet.address(),
                    });
                }
            }

            let (transfer, estimate, asset, amount) = self.plan(wallet.address(), intent).await?;
            let preview = self.preview(wallet.address(), &transfer, &estimate, &asset, amount).await;
            tracing::info!(
                recipient = %preview.recipient,
                amount = %preview.amount,
                symbol = %preview.symbol,
                strategy = %estimate.strategy,
                "Payment prepared"
            );

            Ok(PreparedPayment {
                id,
                preview,
                wallet,
                transfer,
                estimate,
            })
        }
        .instrument(span)
        .await;

        if let Err(e) = &result {
            metrics::record_payment(&self.network_key, e.outcome());
        }
        result
    }

    /// Sign, broadcast and wait for confirmations.
    ///
    /// A message on `cancel` before the broadcast aborts with `Cancelled`.
    pub async fn confirm(
        &self,
        prepared: PreparedPayment,
        cancel: &mut broadcast::Receiver<()>,
    ) -> PaymentResult<PaymentReceipt> {
        let span = tracing::info_span!("payment", payment_id = %prepared.id, network = %self.network_key);
        let result = self.submit_prepared(&prepared, Some(cancel)).instrument(span).await;

        metrics::record_payment(
            &self.network_key,
            match &result {
                Ok(_) => "confirmed",
                Err(e) => e.outcome(),
            },
        );
        // `prepared` (and the signer inside it) is dropped here on every path.
        result
    }

    /// Unattended variant: plan, check and submit without a preview step.
    pub async fn build_and_submit(&self, wallet: &Wallet, intent: &TransactionIntent) -> PaymentResult<PaymentReceipt> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("payment", payment_id = %id, network = %self.network_key);

        let result = async {
            let (transfer, estimate, _, _) = self.plan(wallet.address(), intent).await?;
            let nonce = self.builder.next_nonce(wallet.address()).await?;
            self.finish(id, wallet, &transfer, &estimate, nonce).await
        }
        .instrument(span)
        .await;

        metrics::record_payment(
            &self.network_key,
            match &result {
                Ok(_) => "confirmed",
                Err(e) => e.outcome(),
            },
        );
        result
    }

    /// Native balance plus every token configured on this network.
    ///
    /// A token whose balance cannot be read reports zero.
    pub async fn balances(&self, address: Address) -> PaymentResult<Vec<AssetBalance>> {
        let native = self.rpc.balance(address).await?;
        let mut balances = vec![AssetBalance {
            asset: "native".to_string(),
            symbol: self.network.symbol.clone(),
            decimals: 18,
            amount: native,
        }];

        for (key, token) in &self.config.tokens {
            let Some(contract) = token
                .addresses
                .get(&self.network_key)
                .and_then(|a| a.parse::<Address>().ok())
            else {
                continue;
            };
            let amount = match self.rpc.token_balance(contract, address).await {
                Ok(amount) => amount,
                Err(e) => {
                    tracing::warn!(token = %key, error = %e, "Token balance unavailable, reporting zero");
                    U256::ZERO
                }
            };
            balances.push(AssetBalance {
                asset: key.clone(),
                symbol: token.symbol.clone(),
                decimals: token.decimals,
                amount,
            });
        }

        Ok(balances)
    }

    /// Resolve the intent, estimate gas and run the sufficiency checks.
    async fn plan(
        &self,
        from: Address,
        intent: &TransactionIntent,
    ) -> PaymentResult<(Transfer, GasEstimate, ResolvedAsset, U256)> {
        if intent.network != self.network_key {
            return Err(PaymentError::UnknownNetwork(intent.network.clone()));
        }
        let asset = resolve_asset(&self.config, &self.network_key, &intent.asset)?;
        let amount = parse_amount(&intent.amount, asset.decimals, &self.config.payment)?;
        let to = self.resolve_recipient(&intent.recipient).await?;

        let transfer = match asset.contract {
            None => Transfer::Native { to, value: amount },
            Some(contract) => Transfer::Token { contract, to, amount },
        };

        match &transfer {
            Transfer::Native { .. } => {
                let estimate = self.builder.estimate(from, &transfer).await?;
                let balance = self.rpc.balance(from).await?;
                check_native(balance, amount, estimate.total_cost).map_err(PaymentError::Insufficient)?;
                Ok((transfer, estimate, asset, amount))
            }
            Transfer::Token { contract, .. } => {
                let token_balance = self.rpc.token_balance(*contract, from).await?;
                let estimate = self.builder.estimate(from, &transfer).await?;
                let native_balance = self.rpc.balance(from).await?;
                check_token(&asset.symbol, token_balance, amount, native_balance, estimate.total_cost)?;
                Ok((transfer, estimate, asset, amount))
            }
        }
    }

    async fn preview(
        &self,
        from: Address,
        transfer: &Transfer,
        estimate: &GasEstimate,
        asset: &ResolvedAsset,
        amount: U256,
    ) -> PaymentPreview {
        let recipient = match transfer {
            Transfer::Native { to, .. } | Transfer::Token { to, .. } => *to,
        };

        let prices = match &self.prices {
            Some(aggregator) => {
                let mut wanted = vec![PriceAsset::new(&self.network.price_id, &self.network.symbol, false)];
                if asset.price_id != self.network.price_id {
                    wanted.push(PriceAsset::new(&asset.price_id, &asset.symbol, asset.stable));
                }
                Some(aggregator.fetch(&wanted).await)
            }
            None => None,
        };
        let (asset_price, native_price, price_source) = match &prices {
            Some(set) => usd_prices(set, asset, &self.network.price_id),
            None => (0.0, 0.0, "none".to_string()),
        };

        let amount_str = format_amount(amount, asset.decimals);
        let total_gas = format_amount(estimate.total_cost, 18);
        let amount_usd = amount_str.parse::<f64>().unwrap_or(0.0) * asset_price;
        let gas_usd = total_gas.parse::<f64>().unwrap_or(0.0) * native_price;

        PaymentPreview {
            network: self.network.name.clone(),
            from,
            recipient,
            amount: amount_str,
            symbol: asset.symbol.clone(),
            native_symbol: self.network.symbol.clone(),
            gas_limit: estimate.gas_limit,
            gas_price_gwei: format_amount(U256::from(estimate.gas_price), 9),
            total_gas,
            strategy: estimate.strategy,
            amount_usd,
            gas_usd,
            total_usd: amount_usd + gas_usd,
            price_source,
        }
    }

    async fn submit_prepared(
        &self,
        prepared: &PreparedPayment,
        cancel: Option<&mut broadcast::Receiver<()>>,
    ) -> PaymentResult<PaymentReceipt> {
        let from = prepared.wallet.address();
        let nonce = match cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = Shutdown::cancelled(cancel) => {
                        tracing::info!("Payment cancelled before broadcast");
                        return Err(PaymentError::Cancelled);
                    }
                    nonce = self.builder.next_nonce(from) => nonce?,
                }
            }
            None => self.builder.next_nonce(from).await?,
        };

        self.finish(prepared.id, &prepared.wallet, &prepared.transfer, &prepared.estimate, nonce)
            .await
    }

    /// Broadcast and confirm. Past this point nothing cancels.
    async fn finish(
        &self,
        id: Uuid,
        wallet: &Wallet,
        transfer: &Transfer,
        estimate: &GasEstimate,
        nonce: u64,
    ) -> PaymentResult<PaymentReceipt> {
        let submitted = self.builder.submit_with_nonce(wallet, transfer, estimate, nonce).await?;
        let receipt = self.builder.wait_for_confirmation(submitted).await?;

        tracing::info!(
            tx_hash = %submitted.tx_hash,
            block = receipt.block_number,
            "Payment confirmed"
        );

        Ok(PaymentReceipt {
            id,
            tx_hash: submitted.tx_hash,
            nonce,
            fee_paid: receipt.fee_paid(),
            block_number: receipt.block_number,
            strategy: estimate.strategy,
            explorer_url: self.network.tx_url(&submitted.tx_hash.to_string()),
        })
    }
}

fn usd_prices(set: &PriceSet, asset: &ResolvedAsset, native_id: &str) -> (f64, f64, String) {
    let native = set.usd(native_id);
    let mut asset_price = set.usd(&asset.price_id);
    if asset_price == 0.0 && asset.stable {
        asset_price = 1.0;
    }
    (asset_price, native, set.source.clone())
}

/// Base units to a trimmed decimal string (`1.500000` → `1.5`).
pub fn format_amount(value: U256, decimals: u8) -> String {
    let formatted = format_units(value, decimals).unwrap_or_else(|_| value.to_string());
    if formatted.contains('.') {
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    } else {
        formatted
    }
}
