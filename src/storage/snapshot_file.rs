//! Snapshot File
//!
//! Encrypted full image of the store at a given LSN.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (22 bytes)                                       │
//! │   Magic: "SLKV" (4) | Version: u16 (2) | LSN: u64 (8)   │
//! │   CRC: u32 (4) | Len: u32 (4)                           │
//! ├─────────────────────────────────────────────────────────┤
//! │ Sealed payload (Len bytes)                              │
//! │   bincode BTreeMap<String, Value>, AEAD-sealed          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Written to `{name}.tmp`, fsynced, then renamed over the live file.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};

use crate::crypto::Cipher;
use crate::error::{Result, StoreError};
use crate::value::Value;
use crate::wal::compute_crc;

/// Magic bytes identifying a SealKV snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"SLKV";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + LSN (8) + CRC (4) + Len (4)
pub(crate) const HEADER_SIZE: usize = 22;

/// Reads and writes snapshot images
pub struct SnapshotFile;

impl SnapshotFile {
    /// Atomically replace the snapshot at `path`
    pub fn write(
        path: &Path,
        lsn: u64,
        entries: &BTreeMap<String, Value>,
        cipher: &dyn Cipher,
    ) -> Result<()> {
        let plaintext = bincode::serialize(entries)?;
        let payload = cipher.seal(&plaintext)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            StoreError::Serialization(format!("Snapshot too large: {} bytes", payload.len()))
        })?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u64_le(lsn);
        buf.put_u32_le(compute_crc(&payload));
        buf.put_u32_le(len);
        buf.put_slice(&payload);

        let tmp_path = Self::tmp_path(path);
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        // Persist the rename itself
        if let Some(dir) = path.parent() {
            if let Ok(dir) = File::open(dir) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    /// Load the snapshot at `path`; `Ok(None)` if there is none yet
    ///
    /// Returns the LSN the image covers along with its entries.
    pub fn read(path: &Path, cipher: &dyn Cipher) -> Result<Option<(u64, BTreeMap<String, Value>)>> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };

        if raw.len() < HEADER_SIZE {
            return Err(StoreError::Corruption(format!(
                "Snapshot {} is truncated ({} bytes)",
                path.display(),
                raw.len()
            )));
        }
        if &raw[0..4] != MAGIC {
            return Err(StoreError::Corruption(format!(
                "Invalid snapshot magic: expected SLKV, got {:?}",
                &raw[0..4]
            )));
        }

        let mut header = &raw[4..HEADER_SIZE];
        let version = header.get_u16_le();
        if version != VERSION {
            return Err(StoreError::Corruption(format!(
                "Unsupported snapshot version: {}",
                version
            )));
        }
        let lsn = header.get_u64_le();
        let crc = header.get_u32_le();
        let len = header.get_u32_le() as usize;

        let payload = &raw[HEADER_SIZE..];
        if payload.len() != len || compute_crc(payload) != crc {
            return Err(StoreError::Corruption(format!(
                "Snapshot {} failed its integrity check",
                path.display()
            )));
        }

        let plaintext = cipher.open(payload).map_err(|e| {
            StoreError::KeyCustodyLost(format!("Snapshot cannot be decrypted: {}", e))
        })?;
        let entries = bincode::deserialize(&plaintext)
            .map_err(|e| StoreError::Corruption(format!("Undecodable snapshot: {}", e)))?;

        Ok(Some((lsn, entries)))
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        path.with_file_name(name)
    }
}
