//! In-memory backing store
//!
//! Useful for embedding and for tests: a [`FaultInjector`] handle stays with
//! the test while the store itself moves into the writer thread.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{apply_operations, Snapshot};
use crate::error::{Result, StoreError};
use crate::value::Value;
use crate::wal::Operation;

use super::BackingStore;

/// A failure to inject into the next `apply_batch` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Transient I/O error before anything is applied
    Io,

    /// Transient I/O error after `after` operations of the batch were staged
    IoMidBatch { after: usize },

    /// Non-retryable serialization failure
    Serialization,

    /// Non-retryable encryption failure
    Encryption,

    /// Fatal loss of the data key
    KeyCustodyLost,
}

#[derive(Debug, Default)]
struct Shared {
    durable: BTreeMap<String, Value>,
    faults: VecDeque<Fault>,
    failing_syncs: usize,
    apply_attempts: usize,
    applied_batches: usize,
    syncs: usize,
}

/// Backing store that keeps everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

/// Test-side handle onto a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct FaultInjector {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing entries
    pub fn with_entries(entries: BTreeMap<String, Value>) -> Self {
        let store = Self::default();
        store.shared.lock().durable = entries;
        store
    }

    /// A handle that can inject faults and inspect durable state
    pub fn injector(&self) -> FaultInjector {
        FaultInjector {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl FaultInjector {
    /// Queue a fault for a future `apply_batch` call (FIFO)
    pub fn push(&self, fault: Fault) {
        self.shared.lock().faults.push_back(fault);
    }

    /// Queue the same fault `count` times
    pub fn push_n(&self, fault: Fault, count: usize) {
        let mut shared = self.shared.lock();
        for _ in 0..count {
            shared.faults.push_back(fault.clone());
        }
    }

    /// Fail the next `count` syncs with a transient I/O error
    pub fn fail_syncs(&self, count: usize) {
        self.shared.lock().failing_syncs += count;
    }

    /// Value as durably stored, bypassing any cache
    pub fn durable_value(&self, key: &str) -> Option<Value> {
        self.shared.lock().durable.get(key).cloned()
    }

    pub fn durable_len(&self) -> usize {
        self.shared.lock().durable.len()
    }

    /// Calls to `apply_batch`, including failed ones
    pub fn apply_attempts(&self) -> usize {
        self.shared.lock().apply_attempts
    }

    pub fn applied_batches(&self) -> usize {
        self.shared.lock().applied_batches
    }

    /// Successful syncs
    pub fn sync_count(&self) -> usize {
        self.shared.lock().syncs
    }
}

impl BackingStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.shared.lock().durable.get(key).cloned())
    }

    fn read_all(&self) -> Result<Snapshot> {
        Ok(Snapshot::from_entries(self.shared.lock().durable.clone()))
    }

    fn apply_batch(&mut self, operations: &[Operation]) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.apply_attempts += 1;

        // Stage on a copy; only a fully staged batch replaces durable state
        let mut staged = shared.durable.clone();
        match shared.faults.pop_front() {
            None => {}
            Some(Fault::Io) => return Err(injected_io()),
            Some(Fault::IoMidBatch { after }) => {
                let prefix = after.min(operations.len());
                apply_operations(&mut staged, &operations[..prefix]);
                return Err(injected_io());
            }
            Some(Fault::Serialization) => {
                return Err(StoreError::Serialization("injected fault".to_string()));
            }
            Some(Fault::Encryption) => {
                return Err(StoreError::Encryption("injected fault".to_string()));
            }
            Some(Fault::KeyCustodyLost) => {
                return Err(StoreError::KeyCustodyLost("injected fault".to_string()));
            }
        }

        apply_operations(&mut staged, operations);
        shared.durable = staged;
        shared.applied_batches += 1;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.failing_syncs > 0 {
            shared.failing_syncs -= 1;
            return Err(injected_io());
        }
        shared.syncs += 1;
        Ok(())
    }
}

fn injected_io() -> StoreError {
    StoreError::Io(io::Error::new(io::ErrorKind::Other, "injected fault"))
}
