//! Card wallet: signing key recovered from a card.
//!
//! # Security
//! - Keys come ONLY from a decrypted `CardSecret`; nothing is read from disk or env
//! - Keys are never logged or serialized
//! - The signing key zeroes itself on drop

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::secret::CardSecret;

/// Signer for one payment flow.
#[derive(Clone)]
pub struct Wallet {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a decrypted card key.
    pub fn from_secret(secret: &CardSecret, chain_id: u64) -> BlockchainResult<Self> {
        let bytes = secret
            .to_bytes()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key: {}", e)))?;
        let signer = PrivateKeySigner::from_bytes(&B256::from(*bytes))
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key: {}", e)))?
            .with_chain_id(Some(chain_id));

        tracing::debug!(address = %signer.address(), chain_id = chain_id, "Card wallet ready");

        Ok(Self { signer, chain_id })
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Get the chain ID this wallet is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Network wallet used to sign transaction requests.
    pub fn network_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
