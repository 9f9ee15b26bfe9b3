//! AES-GCM encryption for webhook auth tokens at rest.
//!
//! Stored format: `base64(nonce || ciphertext || tag)` with a fresh random
//! 12-byte nonce per encryption. The key width (128, 192 or 256 bit) follows
//! the length of the configured key. Empty tokens are stored as-is.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use fast32::base64::RFC4648 as BASE64;
use rand::Rng;
use std::fmt;
use thiserror::Error;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("Cipher key not set.")]
    NotConfigured,
    #[error("Invalid cipher key.")]
    InvalidKey,
    /// The ciphertext did not authenticate under the configured key.
    #[error("Wrong cipher key.")]
    WrongKey,
    #[error("Stored token is not valid ciphertext.")]
    Malformed,
}

#[derive(Clone)]
enum Engine {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

/// Symmetric cipher for token fields.
#[derive(Clone)]
pub struct TokenCipher {
    engine: Engine,
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = match self.engine {
            Engine::Aes128(_) => 128,
            Engine::Aes192(_) => 192,
            Engine::Aes256(_) => 256,
        };
        f.debug_struct("TokenCipher").field("bits", &bits).finish()
    }
}

impl TokenCipher {
    /// Build a cipher from a raw 16, 24 or 32 byte key.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let engine = match key.len() {
            16 => Engine::Aes128(
                Aes128Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKey)?,
            ),
            24 => Engine::Aes192(
                Aes192Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKey)?,
            ),
            32 => Engine::Aes256(
                Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKey)?,
            ),
            _ => return Err(CipherError::InvalidKey),
        };
        Ok(Self { engine })
    }

    /// Build a cipher from the configured base64 key.
    ///
    /// `None` means no key was configured.
    pub fn from_config(cipher_key: Option<&str>) -> Result<Self, CipherError> {
        let encoded = cipher_key.ok_or(CipherError::NotConfigured)?;
        Self::new(&decode_cipher_key(encoded)?)
    }

    pub fn encrypt(&self, token: &str) -> Result<String, CipherError> {
        if token.is_empty() {
            return Ok(String::new());
        }
        let nonce_bytes: [u8; NONCE_SIZE] = rand::random();
        let nonce = Nonce::<U12>::from_slice(&nonce_bytes);
        let sealed = match &self.engine {
            Engine::Aes128(c) => c.encrypt(nonce, token.as_bytes()),
            Engine::Aes192(c) => c.encrypt(nonce, token.as_bytes()),
            Engine::Aes256(c) => c.encrypt(nonce, token.as_bytes()),
        }
        .map_err(|_| CipherError::InvalidKey)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(BASE64.encode(&out))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CipherError> {
        if stored.is_empty() {
            return Ok(String::new());
        }
        let raw = BASE64
            .decode_str(stored)
            .map_err(|_| CipherError::Malformed)?;
        if raw.len() <= NONCE_SIZE {
            return Err(CipherError::Malformed);
        }
        let (nonce_bytes, sealed) = raw.split_at(NONCE_SIZE);
        let nonce = Nonce::<U12>::from_slice(nonce_bytes);
        let plain = match &self.engine {
            Engine::Aes128(c) => c.decrypt(nonce, sealed),
            Engine::Aes192(c) => c.decrypt(nonce, sealed),
            Engine::Aes256(c) => c.decrypt(nonce, sealed),
        }
        .map_err(|_| CipherError::WrongKey)?;
        String::from_utf8(plain).map_err(|_| CipherError::Malformed)
    }
}

/// Decode a base64 cipher key and check its length.
pub fn decode_cipher_key(encoded: &str) -> Result<Vec<u8>, CipherError> {
    let key = BASE64
        .decode_str(encoded.trim())
        .map_err(|_| CipherError::InvalidKey)?;
    match key.len() {
        16 | 24 | 32 => Ok(key),
        _ => Err(CipherError::InvalidKey),
    }
}

/// Generate a new base64 cipher key of `length` bytes (16, 24 or 32).
pub fn random_cipher_key(length: usize) -> Result<String, CipherError> {
    if !matches!(length, 16 | 24 | 32) {
        return Err(CipherError::InvalidKey);
    }
    let mut key = vec![0u8; length];
    rand::rng().fill(&mut key[..]);
    Ok(BASE64.encode(&key))
}
