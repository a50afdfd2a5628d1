//! Card payload parsing.
//!
//! Two payload shapes exist in the field:
//! - JSON: `{"addr": "0x…", "ekey": "U2F…", "serial": "…", "ens": "…"}`
//!   (older cards use `encPrivKey` instead of `ekey`)
//! - Pipe form: `encryptedKey|ensName`, with the serial taken from the tag id
//!
//! Either may be wrapped in an NDEF text record, whose status byte and
//! language code precede the text.

use alloy::primitives::Address;
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::card::{CardError, CardResult};

/// Serial used when neither the payload nor the tag carries one.
pub const UNKNOWN_SERIAL: &str = "UNKNOWN";

/// Longest language code accepted in an NDEF text record header.
const MAX_LANG_LEN: usize = 8;

/// Data read from one card tap. Lives for a single payment flow.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CardRecord {
    /// Card serial; part of the passphrase, not itself secret.
    pub serial: String,
    /// CryptoJS ciphertext of the private key.
    pub encrypted_key: String,
    /// Address printed on the card, when present.
    #[zeroize(skip)]
    pub address: Option<Address>,
    pub ens_name: Option<String>,
}

impl std::fmt::Debug for CardRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardRecord")
            .field("serial", &self.serial)
            .field("address", &self.address)
            .field("ens_name", &self.ens_name)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct JsonCard {
    addr: Option<String>,
    ekey: Option<String>,
    #[serde(rename = "encPrivKey")]
    enc_priv_key: Option<String>,
    serial: Option<String>,
    ens: Option<String>,
}

/// Parse raw tag bytes into a card record.
pub fn parse_payload(payload: &[u8], tag_id: Option<&str>) -> CardResult<CardRecord> {
    let body = strip_ndef_text_header(payload);
    let text = std::str::from_utf8(body)
        .map_err(|_| CardError::InvalidPayload("payload is not UTF-8".to_string()))?
        .trim();

    if text.is_empty() {
        return Err(CardError::NoData);
    }

    let fallback_serial = || {
        tag_id
            .filter(|id| !id.is_empty())
            .unwrap_or(UNKNOWN_SERIAL)
            .to_string()
    };

    if let Ok(json) = serde_json::from_str::<JsonCard>(text) {
        let encrypted_key = json
            .ekey
            .or(json.enc_priv_key)
            .filter(|k| !k.is_empty())
            .ok_or(CardError::MissingKey)?;

        let address = match json.addr.as_deref().filter(|a| !a.is_empty()) {
            Some(raw) => Some(raw.parse::<Address>().map_err(|_| {
                CardError::InvalidPayload(format!("invalid card address '{}'", raw))
            })?),
            None => None,
        };

        return Ok(CardRecord {
            serial: json.serial.filter(|s| !s.is_empty()).unwrap_or_else(fallback_serial),
            encrypted_key,
            address,
            ens_name: json.ens.filter(|e| !e.is_empty()),
        });
    }

    let mut parts = text.splitn(2, '|');
    let encrypted_key = parts.next().unwrap_or_default().trim();
    if encrypted_key.is_empty() || encrypted_key.starts_with('{') {
        return Err(CardError::MissingKey);
    }
    let ens_name = parts.next().map(str::trim).filter(|e| !e.is_empty());

    Ok(CardRecord {
        serial: fallback_serial(),
        encrypted_key: encrypted_key.to_string(),
        address: None,
        ens_name: ens_name.map(str::to_string),
    })
}

/// Drop the NDEF text record header (`status byte ‖ language code`) if present.
fn strip_ndef_text_header(payload: &[u8]) -> &[u8] {
    let Some(&status) = payload.first() else {
        return payload;
    };
    // UTF-8 text records carry the language code length in the low bits
    // of a status byte, which is always a control character.
    let lang_len = status as usize;
    if (1..=MAX_LANG_LEN).contains(&lang_len)
        && payload.len() > lang_len
        && payload[1..=lang_len]
            .iter()
            .all(|b| b.is_ascii_alphabetic() || *b == b'-')
    {
        &payload[1 + lang_len..]
    } else {
        payload
    }
}
