//! Storage Module
//!
//! Durable, encrypted backing stores behind the cache.
//!
//! ## Responsibilities
//! - Point reads and full loads for cache (re)population
//! - All-or-nothing application of a batch
//! - Durability on demand (`sync`) for the write barrier
//!
//! ## Implementations
//! - [`EncryptedFileStore`] -- WAL + snapshot image on disk
//! - [`MemoryStore`] -- in-process store with fault injection for tests

mod file_store;
mod memory;
mod snapshot_file;

pub use file_store::EncryptedFileStore;
pub use memory::{Fault, FaultInjector, MemoryStore};
pub use snapshot_file::SnapshotFile;

use crate::cache::Snapshot;
use crate::error::Result;
use crate::value::Value;
use crate::wal::Operation;

/// Durable keyed storage
///
/// Owned exclusively by the writer thread, hence `Send` but not `Sync`.
pub trait BackingStore: Send {
    /// Read a single key
    fn read(&self, key: &str) -> Result<Option<Value>>;

    /// Read every key into a snapshot
    fn read_all(&self) -> Result<Snapshot>;

    /// Apply a batch atomically: either every operation is durable or none is
    ///
    /// Errors:
    /// - `Io` -- transient, the same batch may be retried
    /// - `Serialization` / `Encryption` / `Corruption` -- not retryable
    /// - `KeyCustodyLost` -- fatal
    fn apply_batch(&mut self, operations: &[Operation]) -> Result<()>;

    /// Make everything applied so far durable
    fn sync(&mut self) -> Result<()>;

    /// Fold logged batches into a compact image
    fn compact(&mut self) -> Result<()> {
        Ok(())
    }
}
