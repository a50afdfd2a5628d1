//! Memory-scoped holders for the PIN and the recovered private key.
//!
//! Both types zero their buffers on drop, so every exit path of a payment
//! (success, error, cancellation, panic unwinding) wipes them without the
//! caller having to remember a clear call.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::secret::{SecretError, SecretResult};

/// A 4–6 digit card PIN.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Pin(String);

impl Pin {
    /// Accept 4 to 6 ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, SecretError> {
        let raw = raw.trim();
        let ok = (4..=6).contains(&raw.len()) && raw.bytes().all(|b| b.is_ascii_digit());
        if !ok {
            return Err(SecretError::InvalidPinFormat);
        }
        Ok(Self(raw.to_owned()))
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pin(****)")
    }
}

/// A decrypted card private key: `0x` followed by 64 hex digits.
///
/// Not `Clone`; there is exactly one owner per payment flow.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CardSecret(String);

impl CardSecret {
    /// Wrap an already validated key.
    pub(crate) fn new(key: String) -> Self {
        Self(key)
    }

    /// The key as a hex string. Never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// The raw 32 key bytes.
    pub fn to_bytes(&self) -> SecretResult<Zeroizing<[u8; 32]>> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        let digits = self.0.strip_prefix("0x").ok_or(SecretError::InvalidKey)?;
        hex::decode_to_slice(digits, &mut bytes[..]).map_err(|_| SecretError::InvalidKey)?;
        Ok(bytes)
    }
}

impl std::fmt::Debug for CardSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CardSecret(<redacted>)")
    }
}
