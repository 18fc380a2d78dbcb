//! WAL Writer
//!
//! Handles appending batch records to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::SyncStrategy;
use crate::crypto::Cipher;
use crate::error::Result;

use super::{Operation, WalEntry};

/// Writes batch records to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    cipher: Arc<dyn Cipher>,
    sync_strategy: SyncStrategy,

    /// LSN the next append will receive
    next_lsn: u64,

    /// Byte length of the last fully written record boundary
    len: u64,

    /// Records currently in the file
    record_count: usize,

    /// Records appended since the last fsync
    unsynced: usize,

    /// A failed append left bytes past `len` that could not be cut off yet
    needs_rollback: bool,

    #[cfg(test)]
    faults: TestFaults,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct TestFaults {
    /// Write half of the next frame, then fail
    partial_write: bool,

    /// Fail every rollback while set
    rollback: bool,
}

impl WalWriter {
    /// Open or create a WAL file, appending after any existing records
    ///
    /// The caller passes the LSN to continue from (recovery knows it).
    pub fn open(
        path: &Path,
        sync_strategy: SyncStrategy,
        cipher: Arc<dyn Cipher>,
        next_lsn: u64,
        record_count: usize,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            cipher,
            sync_strategy,
            next_lsn,
            len,
            record_count,
            unsynced: 0,
            needs_rollback: false,
            #[cfg(test)]
            faults: TestFaults::default(),
        })
    }

    /// Append one batch as a single record; returns its LSN
    ///
    /// A failed write rolls the file back to the previous record boundary so
    /// no partial batch is left behind. If that rollback fails too, nothing is
    /// appended until a later rollback succeeds, since a record written after
    /// the partial one would be discarded by recovery.
    pub fn append(&mut self, operations: Vec<Operation>) -> Result<u64> {
        if self.needs_rollback {
            self.roll_back()?;
            self.needs_rollback = false;
            tracing::debug!("Removed partial WAL record at {}", self.len);
        }

        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, operations).encode(self.cipher.as_ref())?;

        let synced = match self.write_frame(&frame) {
            Ok(synced) => synced,
            Err(e) => {
                if let Err(rollback) = self.roll_back() {
                    tracing::error!(
                        "Failed to roll back partial WAL record at {}: {}",
                        self.len,
                        rollback
                    );
                    self.needs_rollback = true;
                }
                return Err(e);
            }
        };

        self.len += frame.len() as u64;
        self.next_lsn += 1;
        self.record_count += 1;
        self.unsynced = if synced { 0 } else { self.unsynced + 1 };

        Ok(lsn)
    }

    /// Write a frame and fsync if the strategy says so; returns whether it synced
    fn write_frame(&mut self, frame: &[u8]) -> Result<bool> {
        #[cfg(test)]
        if std::mem::take(&mut self.faults.partial_write) {
            self.file.write_all(&frame[..frame.len() / 2])?;
            return Err(io::Error::new(io::ErrorKind::Other, "injected partial write").into());
        }

        self.file.write_all(frame)?;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNBatches { count } => self.unsynced + 1 >= count,
        };
        if due {
            self.file.sync_data()?;
        }

        Ok(due)
    }

    /// Cut the file back to the last record boundary
    fn roll_back(&mut self) -> io::Result<()> {
        #[cfg(test)]
        if self.faults.rollback {
            return Err(io::Error::new(io::ErrorKind::Other, "injected rollback failure"));
        }

        self.file.set_len(self.len)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every record (after they were folded into a snapshot)
    ///
    /// LSNs keep counting up across truncations.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.len = 0;
        self.record_count = 0;
        self.unsynced = 0;
        self.needs_rollback = false;
        Ok(())
    }

    /// Get the LSN the next append will use
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Records appended but not yet fsynced
    pub fn unsynced(&self) -> usize {
        self.unsynced
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
