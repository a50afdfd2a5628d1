//! Card secret subsystem.
//!
//! # Responsibilities
//! - Derive the card passphrase from serial and PIN
//! - Decrypt the stored key and check it is shaped like a private key
//! - Hold the PIN and key in buffers that are wiped on drop
//!
//! # Data Flow
//! ```text
//! CardRecord.encrypted_key + Pin + serial
//!     → resolver.rs (passphrase, cipher, shape check)
//!     → CardSecret (zeroized on drop)
//!     → blockchain::Wallet
//! ```

pub mod cipher;
pub mod guard;
pub mod resolver;

use thiserror::Error;

pub use cipher::{CardCipher, CipherError, CryptoJsAes};
pub use guard::{CardSecret, Pin};
pub use resolver::{passphrase, resolve_secret, validate_key_shape, SecretResolver};

/// Errors from secret resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("PIN must be 4 to 6 digits")]
    InvalidPinFormat,

    /// Wrong PIN and a corrupted card are indistinguishable.
    #[error("invalid PIN or corrupted card data")]
    InvalidPinOrCorruptCard,

    #[error("private key must be 32 bytes of hex")]
    InvalidKey,

    #[error("cipher error: {0}")]
    Cipher(String),
}

pub type SecretResult<T> = Result<T, SecretError>;
