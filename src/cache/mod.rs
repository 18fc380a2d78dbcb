//! Cache Module
//!
//! In-memory view of the store, published as immutable snapshots.
//!
//! ## Responsibilities
//! - Serve reads without touching the backing store
//! - Swap in a new snapshot atomically after each committed batch
//! - Drop the snapshot on invalidation so the next read reloads
//!
//! ## Concurrency
//! The only mutable shared state is the `Option<Arc<Snapshot>>` slot. Readers
//! hold the lock just long enough to clone the `Arc`; a reader that already
//! holds a snapshot keeps a complete (possibly stale) view while newer ones
//! are published.

mod snapshot;

use std::sync::Arc;

use parking_lot::RwLock;

pub(crate) use snapshot::apply_operations;
pub use snapshot::Snapshot;

/// Holds the currently visible snapshot
#[derive(Debug, Default)]
pub struct Cache {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl Cache {
    /// Create an empty (not yet loaded) cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The visible snapshot, or `None` if a reload is needed
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    /// Replace the visible snapshot
    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        *self.current.write() = Some(snapshot);
    }

    /// Drop the visible snapshot
    pub fn invalidate(&self) {
        *self.current.write() = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }
}
