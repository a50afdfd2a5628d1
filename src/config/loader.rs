//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::PayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Why a configuration file was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<PayConfig, ConfigError> {
    let config: PayConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(
        networks = config.networks.len(),
        tokens = config.tokens.len(),
        "Configuration loaded"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [payment]
        merchant_address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"

        [networks.base]
        name = "Base"
        chain_id = 8453
        symbol = "ETH"
        rpc_urls = ["https://mainnet.base.org", "https://base.llamarpc.com"]
        price_id = "ethereum"
        high_gas = true
    "#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        let base = config.network("base").unwrap();
        assert_eq!(base.rpc_urls.len(), 2);
        assert!(base.high_gas);
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = parse_config("[networks.base\nname = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_error_display() {
        let err = parse_config("").unwrap_err();
        assert_eq!(err.to_string(), "invalid config: no networks configured");
    }
}
