//! Data key custody
//!
//! The key lifecycle belongs to the host; the store only asks for it.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, StoreError};

/// Length of the AES-256 data key
pub const KEY_SIZE: usize = 32;

/// The symmetric key used to seal stored data
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    bytes: [u8; KEY_SIZE],
}

impl DataKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey(<redacted>)")
    }
}

/// Supplies the data key at store open time
///
/// Returning `KeyCustodyLost` tells the store that existing data can never be
/// decrypted again.
pub trait KeyProvider {
    fn data_key(&self) -> Result<DataKey>;
}

/// A provider for hosts that already hold the key in memory
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    key: DataKey,
}

impl StaticKeyProvider {
    pub fn new(key: DataKey) -> Self {
        Self { key }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn data_key(&self) -> Result<DataKey> {
        Ok(self.key.clone())
    }
}

/// Reads a raw 32-byte key from a file
#[derive(Debug, Clone)]
pub struct KeyFileProvider {
    path: PathBuf,
}

impl KeyFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write a freshly generated key; fails if the file already exists
    pub fn generate(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let key = DataKey::generate();

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(key.as_bytes())?;
        file.sync_all()?;

        tracing::debug!("Generated new data key at {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyProvider for KeyFileProvider {
    fn data_key(&self) -> Result<DataKey> {
        let mut raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::KeyCustodyLost(format!(
                    "Key file {} is missing",
                    self.path.display()
                )));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let result = <[u8; KEY_SIZE]>::try_from(raw.as_slice())
            .map(DataKey::from_bytes)
            .map_err(|_| {
                StoreError::KeyCustodyLost(format!(
                    "Key file {} holds {} bytes, expected {}",
                    self.path.display(),
                    raw.len(),
                    KEY_SIZE
                ))
            });
        raw.zeroize();
        result
    }
}
