//! WAL Entry definitions
//!
//! One entry holds one committed batch, so a batch lands on disk as a single
//! framed record or not at all.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::crypto::Cipher;
use crate::error::{Result, StoreError};
use crate::value::Value;

/// Record header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest payload accepted when reading a record back (64 MB)
pub const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// A single mutation inside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Set a key to a value
    Put { key: String, value: Value },

    /// Remove a key (no-op if absent)
    Remove { key: String },
}

impl Operation {
    pub fn key(&self) -> &str {
        match self {
            Operation::Put { key, .. } | Operation::Remove { key } => key,
        }
    }
}

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,

    /// The batch, in staged order
    pub operations: Vec<Operation>,
}

impl WalEntry {
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self {
            lsn,
            timestamp,
            operations,
        }
    }

    /// Serialize, seal and frame the entry
    ///
    /// Format: lsn (8) + crc (4) + len (4) + sealed payload
    pub fn encode(&self, cipher: &dyn Cipher) -> Result<Vec<u8>> {
        let plaintext = bincode::serialize(self)?;
        let payload = cipher.seal(&plaintext)?;

        let len = u32::try_from(payload.len())
            .ok()
            .filter(|&len| len <= MAX_RECORD_SIZE)
            .ok_or_else(|| {
                StoreError::Serialization(format!(
                    "Batch too large: {} bytes (max {})",
                    payload.len(),
                    MAX_RECORD_SIZE
                ))
            })?;

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        frame.put_u64_le(self.lsn);
        frame.put_u32_le(compute_crc(&payload));
        frame.put_u32_le(len);
        frame.put_slice(&payload);

        Ok(frame.to_vec())
    }

    /// Open and deserialize a payload whose CRC has already been checked
    pub fn decode_payload(lsn: u64, payload: &[u8], cipher: &dyn Cipher) -> Result<Self> {
        let plaintext = cipher.open(payload)?;
        let entry: WalEntry = bincode::deserialize(&plaintext)
            .map_err(|e| StoreError::Corruption(format!("Undecodable WAL entry: {}", e)))?;

        if entry.lsn != lsn {
            return Err(StoreError::Corruption(format!(
                "WAL header LSN {} does not match entry LSN {}",
                lsn, entry.lsn
            )));
        }

        Ok(entry)
    }
}

/// CRC32 over the sealed payload
pub fn compute_crc(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}
