//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use crate::crypto::Cipher;
use crate::error::Result;

use super::reader::{ReadOutcome, WalReader};
use super::WalEntry;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of torn or corrupted tail records discarded (0 or 1)
    pub entries_corrupted: u64,

    /// Last valid LSN (0 if none)
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,

    /// Byte length of the valid prefix
    pub valid_len: u64,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first torn or corrupted record
    /// 3. Truncate the file to the end of the last valid record
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path, cipher: Arc<dyn Cipher>) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result) = Self::scan(path, cipher)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_len)?;
            file.sync_all()?;
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path, cipher: Arc<dyn Cipher>) -> Result<RecoveryResult> {
        Self::scan(path, cipher).map(|(_, result)| result)
    }

    fn scan(path: &Path, cipher: Arc<dyn Cipher>) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let mut reader = WalReader::open(path, cipher)?;
        let mut entries: Vec<WalEntry> = Vec::new();
        let mut result = RecoveryResult {
            entries_recovered: 0,
            entries_corrupted: 0,
            last_lsn: 0,
            was_truncated: false,
            valid_len: 0,
        };

        loop {
            let before = reader.position();
            match reader.next_record()? {
                ReadOutcome::Entry(entry) => {
                    if entry.lsn <= result.last_lsn {
                        tracing::warn!(
                            "WAL LSN went backwards ({} after {}), discarding tail",
                            entry.lsn,
                            result.last_lsn
                        );
                        result.entries_corrupted += 1;
                        result.was_truncated = true;
                        result.valid_len = before;
                        break;
                    }
                    result.last_lsn = entry.lsn;
                    result.entries_recovered += 1;
                    entries.push(entry);
                }
                ReadOutcome::End => {
                    result.valid_len = reader.position();
                    break;
                }
                ReadOutcome::Torn { reason } => {
                    tracing::warn!("Discarding torn WAL tail at offset {}: {}", before, reason);
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    result.valid_len = before;
                    break;
                }
            }
        }

        Ok((entries, result))
    }
}
