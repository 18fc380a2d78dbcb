//! Encrypted File Store
//!
//! The on-disk backing store: a snapshot image plus a WAL of later batches.
//!
//! ## Responsibilities
//! - Recover the full key space on open (snapshot, then WAL replay)
//! - Append each batch as one sealed WAL record
//! - Fold the WAL into a new snapshot once it grows past the threshold

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{apply_operations, Snapshot};
use crate::config::Config;
use crate::crypto::Cipher;
use crate::error::Result;
use crate::value::Value;
use crate::wal::{Operation, WalRecovery, WalWriter};

use super::{BackingStore, SnapshotFile};

/// Durable, encrypted store rooted at a data directory
///
/// Keeps a decrypted mirror of every key in memory so reads and full loads
/// never touch the disk after open.
pub struct EncryptedFileStore {
    data_dir: PathBuf,
    snapshot_path: PathBuf,
    cipher: Arc<dyn Cipher>,

    /// Decrypted view of everything durable so far
    entries: BTreeMap<String, Value>,

    wal: WalWriter,

    /// LSN covered by the snapshot file
    snapshot_lsn: u64,

    compaction_threshold: usize,
}

impl EncryptedFileStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SNAPSHOT_FILENAME: &'static str = "snapshot.db";

    /// Open or create a store under `config.data_dir`
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Load the snapshot image, if any
    /// 3. Replay WAL records newer than the snapshot, truncating a torn tail
    /// 4. Continue appending after the last valid record
    pub fn open(config: &Config, cipher: Arc<dyn Cipher>) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let snapshot_path = config.data_dir.join(Self::SNAPSHOT_FILENAME);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let (snapshot_lsn, mut entries) = match SnapshotFile::read(&snapshot_path, cipher.as_ref())? {
            Some((lsn, entries)) => (lsn, entries),
            None => (0, BTreeMap::new()),
        };

        let mut last_lsn = snapshot_lsn;
        let mut record_count = 0;
        if wal_path.exists() {
            let (records, recovery) = WalRecovery::recover(&wal_path, Arc::clone(&cipher))?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::debug!(
                    "WAL recovery: {} entries recovered, {} discarded, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }

            for record in records {
                record_count += 1;
                // Already folded into the snapshot by an interrupted compaction
                if record.lsn <= snapshot_lsn {
                    continue;
                }
                apply_operations(&mut entries, &record.operations);
                last_lsn = record.lsn;
            }
        }

        let wal = WalWriter::open(
            &wal_path,
            config.sync_strategy,
            Arc::clone(&cipher),
            last_lsn + 1,
            record_count,
        )?;

        tracing::debug!(
            "Opened store at {} with {} keys (snapshot_lsn={}, next_lsn={})",
            config.data_dir.display(),
            entries.len(),
            snapshot_lsn,
            last_lsn + 1
        );

        Ok(Self {
            data_dir: config.data_dir.clone(),
            snapshot_path,
            cipher,
            entries,
            wal,
            snapshot_lsn,
            compaction_threshold: config.compaction_threshold,
        })
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Records currently in the WAL
    pub fn wal_record_count(&self) -> usize {
        self.wal.record_count()
    }

    /// LSN the snapshot file covers
    pub fn snapshot_lsn(&self) -> u64 {
        self.snapshot_lsn
    }

    /// LSN of the last applied batch
    pub fn last_lsn(&self) -> u64 {
        self.wal.current_lsn() - 1
    }
}

impl BackingStore for EncryptedFileStore {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn read_all(&self) -> Result<Snapshot> {
        Ok(Snapshot::from_entries(self.entries.clone()))
    }

    fn apply_batch(&mut self, operations: &[Operation]) -> Result<()> {
        // Step 1: Durable first; the mirror only changes after the record lands
        self.wal.append(operations.to_vec())?;

        // Step 2: Update the in-memory mirror
        apply_operations(&mut self.entries, operations);

        // Step 3: Compact if the log has grown too long
        if self.wal.record_count() >= self.compaction_threshold {
            if let Err(e) = self.compact() {
                // The batch is already durable in the WAL; try again next time
                tracing::warn!("Compaction failed, keeping WAL: {}", e);
            }
        }

        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.wal.sync()
    }

    fn compact(&mut self) -> Result<()> {
        if self.wal.record_count() == 0 {
            return Ok(());
        }

        let lsn = self.last_lsn();
        SnapshotFile::write(&self.snapshot_path, lsn, &self.entries, self.cipher.as_ref())?;
        self.snapshot_lsn = lsn;
        self.wal.truncate()?;

        tracing::debug!("Compacted {} keys into snapshot at lsn={}", self.entries.len(), lsn);
        Ok(())
    }
}
