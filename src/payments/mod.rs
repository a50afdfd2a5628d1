//! Payment subsystem.
//!
//! # Data Flow
//! ```text
//! TransactionIntent
//!     → intent.rs (asset lookup, amount parsing, min/max limits)
//!     → sufficiency.rs (balance covers amount and gas)
//!     → flow.rs (secret → wallet → estimate → preview → submit → confirm)
//! ```

pub mod error;
pub mod flow;
pub mod intent;
pub mod sufficiency;

pub use error::{PaymentError, PaymentResult};
pub use flow::{format_amount, AssetBalance, PaymentFlow, PaymentPreview, PaymentReceipt, PreparedPayment};
pub use intent::{parse_amount, resolve_asset, ResolvedAsset, TransactionIntent, NATIVE};
pub use sufficiency::{check_native, check_token, Shortfall};
