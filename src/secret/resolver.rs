//! Card secret resolution: serial + PIN → passphrase → private key.

use zeroize::Zeroizing;

use crate::secret::cipher::{CardCipher, CryptoJsAes};
use crate::secret::guard::{CardSecret, Pin};
use crate::secret::{SecretError, SecretResult};

/// Length of `0x` + 32 bytes in hex.
const KEY_HEX_LEN: usize = 66;

/// Build the card passphrase. Provisioned cards depend on this exact format.
pub fn passphrase(serial: &str, pin: &Pin) -> Zeroizing<String> {
    Zeroizing::new(format!("{}-PIN{}-SECURE", serial, pin.expose()))
}

/// The only integrity check on a decrypted key: `0x` + 64 hex digits.
pub fn validate_key_shape(candidate: &str) -> bool {
    candidate.len() == KEY_HEX_LEN
        && candidate.starts_with("0x")
        && candidate[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Recovers card keys with a pluggable cipher.
#[derive(Debug, Clone, Default)]
pub struct SecretResolver<C = CryptoJsAes> {
    cipher: C,
}

impl SecretResolver<CryptoJsAes> {
    /// Resolver for cards written by the wallet's CryptoJS-compatible encryption.
    pub fn cryptojs() -> Self {
        Self::new(CryptoJsAes)
    }
}

impl<C: CardCipher> SecretResolver<C> {
    pub fn new(cipher: C) -> Self {
        Self { cipher }
    }

    /// Decrypt the card's stored key.
    ///
    /// Any cipher failure and any plaintext that is not a well-formed key
    /// collapse into `InvalidPinOrCorruptCard`; the two cannot be told apart.
    pub fn resolve(&self, encrypted_key: &str, pin: &Pin, serial: &str) -> SecretResult<CardSecret> {
        tracing::debug!(serial = %serial, "Attempting card key decryption");

        let phrase = passphrase(serial, pin);
        let decrypted = self
            .cipher
            .decrypt(encrypted_key, &phrase)
            .map_err(|e| {
                tracing::debug!(serial = %serial, reason = %e, "Card key decryption failed");
                SecretError::InvalidPinOrCorruptCard
            })?;

        let key = normalize(&decrypted);
        if !validate_key_shape(&key) {
            tracing::debug!(serial = %serial, "Decrypted value is not a private key");
            return Err(SecretError::InvalidPinOrCorruptCard);
        }

        Ok(CardSecret::new(key.to_string()))
    }

    /// Encrypt a private key for a card (provisioning direction).
    pub fn provision(&self, private_key: &str, pin: &Pin, serial: &str) -> SecretResult<String> {
        let key = normalize(private_key.trim());
        if !validate_key_shape(&key) {
            return Err(SecretError::InvalidKey);
        }
        let phrase = passphrase(serial, pin);
        self.cipher
            .encrypt(&key, &phrase)
            .map_err(|e| SecretError::Cipher(e.to_string()))
    }
}

/// Decrypt a card key with the default CryptoJS-compatible cipher.
pub fn resolve_secret(encrypted_key: &str, pin: &str, serial: &str) -> SecretResult<CardSecret> {
    let pin = Pin::parse(pin)?;
    SecretResolver::cryptojs().resolve(encrypted_key, &pin, serial)
}

fn normalize(decrypted: &str) -> Zeroizing<String> {
    if decrypted.starts_with("0x") {
        Zeroizing::new(decrypted.to_owned())
    } else {
        Zeroizing::new(format!("0x{}", decrypted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::cipher::CipherError;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    // openssl enc -aes-256-cbc -md md5 -pass pass:ABC123-PIN4321-SECURE, plaintext with 0x.
    const CARD_WITH_PREFIX: &str = "U2FsdGVkX1+msMkOkzeCVvSowCgfX0nBfskVgdzhWS2J7cvv40YOan/7hZ+uuR1t166TEGTXNXwWhBzhMEBxwYCWgUOza3z1p99ycmHPIzy+ZCxgs0Y2l4L2DRrwK3/V";
    // openssl enc ... -pass pass:04A1B2C3D4E5F6-PIN987654-SECURE, plaintext without 0x.
    const CARD_WITHOUT_PREFIX: &str = "U2FsdGVkX1+v1QI3IMkQP/uL6SbhESQmq5aJrzibINF47a9Ez+22oS5fE1sxdpVQ+OhEZrCjmclUyKi0pRAgKYgjPX8rZ47C19TznJpMBHG9kYu9KuXDN70mU9QBHYKD";
    // Valid ciphertext of the text "not a key" under ABC123 / 4321.
    const CARD_GARBAGE: &str = "U2FsdGVkX1+07iagmYzXo7fTLKwqx8vZULZ+NNTyQ/w=";

    #[test]
    fn test_passphrase_format() {
        let pin = Pin::parse("4321").unwrap();
        assert_eq!(passphrase("ABC123", &pin).as_str(), "ABC123-PIN4321-SECURE");
    }

    #[test]
    fn test_resolves_known_card() {
        let secret = resolve_secret(CARD_WITH_PREFIX, "4321", "ABC123").unwrap();
        assert_eq!(secret.expose(), KEY);
    }

    #[test]
    fn test_adds_missing_prefix() {
        let secret = resolve_secret(CARD_WITHOUT_PREFIX, "987654", "04A1B2C3D4E5F6").unwrap();
        assert_eq!(secret.expose(), KEY);
    }

    #[test]
    fn test_wrong_pin() {
        for pin in ["4322", "0000", "43210", "1234"] {
            let err = resolve_secret(CARD_WITH_PREFIX, pin, "ABC123").unwrap_err();
            assert_eq!(err, SecretError::InvalidPinOrCorruptCard, "pin {}", pin);
        }
    }

    #[test]
    fn test_wrong_serial() {
        let err = resolve_secret(CARD_WITH_PREFIX, "4321", "ABC124").unwrap_err();
        assert_eq!(err, SecretError::InvalidPinOrCorruptCard);
    }

    #[test]
    fn test_well_padded_garbage_rejected() {
        let err = resolve_secret(CARD_GARBAGE, "4321", "ABC123").unwrap_err();
        assert_eq!(err, SecretError::InvalidPinOrCorruptCard);
    }

    #[test]
    fn test_corrupt_ciphertext() {
        let err = resolve_secret("definitely not base64!", "4321", "ABC123").unwrap_err();
        assert_eq!(err, SecretError::InvalidPinOrCorruptCard);
    }

    #[test]
    fn test_pin_format_checked_first() {
        let err = resolve_secret(CARD_WITH_PREFIX, "43", "ABC123").unwrap_err();
        assert_eq!(err, SecretError::InvalidPinFormat);
    }

    #[test]
    fn test_validate_key_shape() {
        assert!(validate_key_shape(KEY));
        assert!(validate_key_shape(&KEY.to_uppercase().replace("0X", "0x")));
        assert!(!validate_key_shape(&KEY[..65]));
        assert!(!validate_key_shape(&format!("{}0", KEY)));
        assert!(!validate_key_shape(&KEY.replace('a', "g")));
        assert!(!validate_key_shape(&KEY[2..]));
        assert!(!validate_key_shape(""));
    }

    #[test]
    fn test_provision_round_trip() {
        let resolver = SecretResolver::cryptojs();
        let pin = Pin::parse("4321").unwrap();
        let ct = resolver.provision(&KEY[2..], &pin, "ABC123").unwrap();
        let secret = resolver.resolve(&ct, &pin, "ABC123").unwrap();
        assert_eq!(secret.expose(), KEY);
    }

    #[test]
    fn test_provision_rejects_bad_key() {
        let pin = Pin::parse("4321").unwrap();
        let err = SecretResolver::cryptojs().provision("0x1234", &pin, "ABC123").unwrap_err();
        assert_eq!(err, SecretError::InvalidKey);
    }

    struct FailingCipher;

    impl CardCipher for FailingCipher {
        fn decrypt(&self, _: &str, _: &str) -> Result<Zeroizing<String>, CipherError> {
            Err(CipherError::Decrypt)
        }
        fn encrypt(&self, _: &str, _: &str) -> Result<String, CipherError> {
            Err(CipherError::Format)
        }
    }

    #[test]
    fn test_cipher_is_pluggable() {
        let resolver = SecretResolver::new(FailingCipher);
        let pin = Pin::parse("4321").unwrap();
        assert_eq!(
            resolver.resolve(CARD_WITH_PREFIX, &pin, "ABC123").unwrap_err(),
            SecretError::InvalidPinOrCorruptCard
        );
        assert!(matches!(
            resolver.provision(KEY, &pin, "ABC123").unwrap_err(),
            SecretError::Cipher(_)
        ));
    }
}
