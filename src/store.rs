//! Store Module
//!
//! The façade value groups talk to.
//!
//! ## Responsibilities
//! - Typed reads served from the cache
//! - Write transactions handed to the writer thread
//! - The shutdown barrier
//! - Lazy cache population on first read

use std::sync::Arc;

use crate::cache::{Cache, Snapshot};
use crate::config::{Config, RetryPolicy};
use crate::crypto::{AesGcmCipher, KeyProvider};
use crate::error::{Result, StoreError};
use crate::storage::{BackingStore, EncryptedFileStore};
use crate::value::{FromValue, Value};
use crate::writer::{WriteHandle, WriteQueue, WriteTransaction};

/// Encrypted, cached key-value store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (commit): queued to one writer thread, applied in commit order
///   - The writer owns the backing store outright
///   - Each applied batch is published as a new immutable snapshot
///
/// - **Reads** (get): served from the current snapshot
///   - Never wait on a queued or in-flight write
///   - Only an unloaded cache sends a reload through the queue
///
/// Construct once at startup and share it (`Arc<KeyValueStore>`) with every
/// value group.
pub struct KeyValueStore {
    cache: Arc<Cache>,
    queue: WriteQueue,
}

impl KeyValueStore {
    /// Open or create an encrypted store on disk
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Ask the host for the data key
    /// 3. Recover the on-disk state (snapshot + WAL)
    /// 4. Start the writer thread
    pub fn open(config: Config, keys: &dyn KeyProvider) -> Result<Self> {
        config.validate()?;

        let key = keys.data_key()?;
        let cipher = Arc::new(AesGcmCipher::new(&key)?);
        let backing = EncryptedFileStore::open(&config, cipher)?;

        Self::with_backing_store(Box::new(backing), config.retry_policy)
    }

    /// Run the store over any backing store
    pub fn with_backing_store(
        backing: Box<dyn BackingStore>,
        retry_policy: RetryPolicy,
    ) -> Result<Self> {
        let cache = Arc::new(Cache::new());
        let queue = WriteQueue::start(backing, Arc::clone(&cache), retry_policy)?;
        Ok(Self { cache, queue })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read `key` as `T`
    ///
    /// Served from the cache without waiting on writes, except when the cache
    /// is unloaded (first read, or after a reset): that read queues behind
    /// every earlier commit, including its retries.
    ///
    /// Errors:
    /// - `KeyMissing` if the key is absent
    /// - `TypeMismatch` if it holds another type
    pub fn get<T: FromValue>(&self, key: &str) -> Result<T> {
        let snapshot = self.snapshot()?;
        let value = snapshot
            .get(key)
            .ok_or_else(|| StoreError::KeyMissing(key.to_string()))?;
        typed(key, value)
    }

    /// Read `key` as `T`, falling back to `default` if absent
    ///
    /// A value of the wrong type is still an error.
    pub fn get_or<T: FromValue>(&self, key: &str, default: T) -> Result<T> {
        let snapshot = self.snapshot()?;
        match snapshot.get(key) {
            Some(value) => typed(key, value),
            None => Ok(default),
        }
    }

    /// Read the raw value, whatever its type
    pub fn get_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.snapshot()?.get(key).cloned())
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.snapshot()?.contains_key(key))
    }

    /// The current snapshot, loading it first if needed
    ///
    /// Loading goes through the write queue, so it blocks until earlier
    /// commits finish.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.queue.check_fatal()?;
        loop {
            if let Some(snapshot) = self.cache.current() {
                return Ok(snapshot);
            }
            // The writer publishes the reload; loop in case the cache was
            // invalidated again before we looked
            self.queue.reload()?;
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Start a new, empty transaction
    pub fn begin_write(&self) -> WriteTransaction<'_> {
        WriteTransaction::new(&self.queue)
    }

    /// Commit a single put
    pub fn put(&self, key: impl Into<String>, value: impl Into<Value>) -> WriteHandle {
        let mut tx = self.begin_write();
        tx.put(key, value);
        tx.commit()
    }

    /// Commit a single removal
    pub fn remove(&self, key: impl Into<String>) -> WriteHandle {
        let mut tx = self.begin_write();
        tx.remove(key);
        tx.commit()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Block until every previously committed transaction has been durably
    /// applied or has failed
    ///
    /// Meant for the crash/shutdown path, so the last write is never lost.
    pub fn block_until_all_writes_finished(&self) -> Result<()> {
        self.queue.barrier()
    }

    /// Fold the backing store's log into a compact image
    pub fn compact(&self) -> Result<()> {
        self.queue.compact()
    }

    /// Forget the cached snapshot; the next read reloads from storage
    #[cfg(any(test, feature = "testing"))]
    pub fn reset_cache(&self) {
        self.cache.invalidate();
    }

    /// Drain pending writes, sync, and stop the writer
    pub fn close(mut self) -> Result<()> {
        let result = self.queue.barrier();
        self.queue.shutdown();
        result
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Transactions committed but not yet finished
    pub fn pending_writes(&self) -> usize {
        self.queue.pending()
    }

    /// Whether a snapshot is currently loaded
    pub fn is_cache_loaded(&self) -> bool {
        self.cache.is_loaded()
    }

    /// Whether the data key was found to be unusable
    pub fn is_key_custody_lost(&self) -> bool {
        self.queue.check_fatal().is_err()
    }
}

fn typed<T: FromValue>(key: &str, value: &Value) -> Result<T> {
    T::from_value(value).ok_or_else(|| StoreError::TypeMismatch {
        key: key.to_string(),
        expected: T::VALUE_TYPE,
        found: value.value_type(),
    })
}
