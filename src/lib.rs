//! Tap-to-pay terminal library.
//!
//! A card stores an encrypted private key; the terminal decrypts it with a
//! PIN-derived passphrase and sends a native or ERC-20 payment to the merchant.

pub mod blockchain;
pub mod card;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod oracle;
pub mod payments;
pub mod resilience;
pub mod secret;

pub use config::PayConfig;
pub use lifecycle::Shutdown;
pub use payments::{PaymentError, PaymentFlow, TransactionIntent};
