//! AEAD cipher
//!
//! AES-256-GCM with a fresh random nonce per payload.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Result, StoreError};

use super::DataKey;

/// Nonce length prepended to each sealed payload
pub const NONCE_SIZE: usize = 12;

/// Authentication tag length appended by GCM
pub const TAG_SIZE: usize = 16;

/// Seals and opens opaque payloads
///
/// Implementations must authenticate: `open` fails on any tampering or on a
/// key that did not produce the payload.
pub trait Cipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>>;
}

/// AES-256-GCM cipher
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn new(key: &DataKey) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| StoreError::Encryption(format!("Failed to create cipher: {}", e)))?;
        Ok(Self { cipher })
    }
}

impl Cipher for AesGcmCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| StoreError::Encryption(format!("Encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StoreError::Encryption(format!(
                "Sealed payload too short: {} bytes",
                sealed.len()
            )));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| StoreError::Encryption(format!("Decryption failed: {}", e)))
    }
}
