//! Card ciphertext format.
//!
//! Cards are provisioned with the CryptoJS / OpenSSL passphrase format:
//! `base64("Salted__" ‖ salt[8] ‖ AES-256-CBC(PKCS#7))`, with key and IV
//! derived from the passphrase by `EVP_BytesToKey` (MD5, one round).
//!
//! The format carries no MAC. A wrong passphrase usually trips the padding
//! check, but can also yield well-padded garbage, so callers must validate the
//! plaintext themselves (see `resolver::validate_key_shape`).

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

const SALT_MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Errors from the card cipher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("ciphertext is not valid base64")]
    Encoding,

    #[error("ciphertext is not in salted OpenSSL format")]
    Format,

    #[error("decryption failed")]
    Decrypt,
}

/// Symmetric scheme used to protect the key stored on a card.
pub trait CardCipher: Send + Sync {
    /// Decrypt `ciphertext` with `passphrase` into UTF-8 text.
    fn decrypt(&self, ciphertext: &str, passphrase: &str) -> Result<Zeroizing<String>, CipherError>;

    /// Encrypt `plaintext` with `passphrase` (card provisioning).
    fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String, CipherError>;
}

/// CryptoJS-compatible `AES.encrypt(text, passphrase)` / `AES.decrypt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoJsAes;

impl CardCipher for CryptoJsAes {
    fn decrypt(&self, ciphertext: &str, passphrase: &str) -> Result<Zeroizing<String>, CipherError> {
        let raw = STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| CipherError::Encoding)?;

        if raw.len() < SALT_MAGIC.len() + SALT_LEN + BLOCK_LEN || &raw[..SALT_MAGIC.len()] != SALT_MAGIC {
            return Err(CipherError::Format);
        }
        let (salt, body) = raw[SALT_MAGIC.len()..].split_at(SALT_LEN);
        if body.len() % BLOCK_LEN != 0 {
            return Err(CipherError::Format);
        }

        let material = evp_bytes_to_key(passphrase.as_bytes(), salt);
        let plain = Aes256CbcDec::new_from_slices(&material[..KEY_LEN], &material[KEY_LEN..])
            .map_err(|_| CipherError::Decrypt)?
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| CipherError::Decrypt)?;
        let plain = Zeroizing::new(plain);

        let text = std::str::from_utf8(&plain).map_err(|_| CipherError::Decrypt)?;
        Ok(Zeroizing::new(text.to_owned()))
    }

    fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String, CipherError> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        encrypt_with_salt(plaintext, passphrase, &salt)
    }
}

fn encrypt_with_salt(plaintext: &str, passphrase: &str, salt: &[u8; SALT_LEN]) -> Result<String, CipherError> {
    let material = evp_bytes_to_key(passphrase.as_bytes(), salt);
    let body = Aes256CbcEnc::new_from_slices(&material[..KEY_LEN], &material[KEY_LEN..])
        .map_err(|_| CipherError::Format)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut out = Vec::with_capacity(SALT_MAGIC.len() + SALT_LEN + body.len());
    out.extend_from_slice(SALT_MAGIC);
    out.extend_from_slice(salt);
    out.extend_from_slice(&body);
    Ok(STANDARD.encode(out))
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration.
fn evp_bytes_to_key(passphrase: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN + IV_LEN]> {
    let mut material = Zeroizing::new([0u8; KEY_LEN + IV_LEN]);
    let mut previous = Zeroizing::new(Vec::new());
    let mut filled = 0;

    while filled < material.len() {
        let mut hasher = Md5::new();
        hasher.update(&previous[..]);
        hasher.update(passphrase);
        hasher.update(salt);
        let digest = hasher.finalize();

        let take = (material.len() - filled).min(digest.len());
        material[filled..filled + take].copy_from_slice(&digest[..take]);
        filled += take;
        previous.zeroize();
        previous.extend_from_slice(&digest);
    }

    material
}
