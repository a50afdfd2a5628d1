//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PayConfig (validated, immutable)
//!     → shared via Arc with the payment flow, RPC selector and oracles
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; network/token registries are data, not globals
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CardConfig, GasConfig, NetworkConfig, ObservabilityConfig, PayConfig, PaymentConfig,
    PriceConfig, PriceSourceKind, RpcConfig, TokenConfig,
};
pub use validation::ValidationError;
