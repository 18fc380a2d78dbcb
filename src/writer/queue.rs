//! Write queue and writer thread

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::cache::Cache;
use crate::config::RetryPolicy;
use crate::error::{Result, StoreError};
use crate::storage::BackingStore;
use crate::wal::Operation;

use super::WriteHandle;

/// Work items processed by the writer thread, strictly in arrival order
enum Request {
    /// Apply a committed transaction
    Commit {
        id: u64,
        operations: Vec<Operation>,
        done: Sender<Result<()>>,
    },

    /// Load the full key space and publish it to the cache
    Reload { done: Sender<Result<()>> },

    /// Reply once everything queued earlier is finished and synced
    Barrier { done: Sender<Result<()>> },

    /// Fold the backing store's log into a compact image
    Compact { done: Sender<Result<()>> },

    /// Stop after everything queued earlier
    Shutdown,
}

/// Set once the data key is found to be unusable; never cleared
#[derive(Debug, Default)]
struct FatalState {
    reason: OnceLock<String>,
}

impl FatalState {
    /// Returns false if a reason was already recorded
    fn set(&self, reason: &str) -> bool {
        self.reason.set(reason.to_string()).is_ok()
    }

    fn check(&self) -> Result<()> {
        match self.reason.get() {
            Some(reason) => Err(StoreError::KeyCustodyLost(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Front end of the writer thread
///
/// ## Concurrency:
/// - `sender`: crossbeam MPSC channel, so concurrent commits are linearized
///   by the order in which they enter the channel
/// - The backing store lives on the writer thread only
/// - All methods use `&self`; only shutdown needs `&mut self`
pub struct WriteQueue {
    sender: Sender<Request>,
    worker: Option<JoinHandle<()>>,
    next_id: AtomicU64,
    pending: Arc<AtomicUsize>,
    fatal: Arc<FatalState>,
}

impl WriteQueue {
    /// Spawn the writer thread, moving the backing store onto it
    pub fn start(
        backing: Box<dyn BackingStore>,
        cache: Arc<Cache>,
        retry_policy: RetryPolicy,
    ) -> Result<Self> {
        let (sender, receiver) = channel::unbounded();
        let pending = Arc::new(AtomicUsize::new(0));
        let fatal = Arc::new(FatalState::default());

        let writer = Writer {
            backing,
            cache,
            retry_policy,
            pending: Arc::clone(&pending),
            fatal: Arc::clone(&fatal),
        };
        let worker = thread::Builder::new()
            .name("sealkv-writer".to_string())
            .spawn(move || writer.run(receiver))?;

        Ok(Self {
            sender,
            worker: Some(worker),
            next_id: AtomicU64::new(1),
            pending,
            fatal,
        })
    }

    /// Enqueue a committed batch
    pub(crate) fn submit(&self, operations: Vec<Operation>) -> WriteHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (done, handle) = channel::bounded(1);

        if let Err(e) = self.fatal.check() {
            let _ = done.send(Err(e));
            return WriteHandle::new(id, handle);
        }

        tracing::trace!("Queued transaction {} ({} operations)", id, operations.len());
        self.pending.fetch_add(1, Ordering::SeqCst);
        let request = Request::Commit {
            id,
            operations,
            done,
        };
        if self.sender.send(request).is_err() {
            // The request (and its sender) is dropped, so the handle reports
            // WriterUnavailable
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }

        WriteHandle::new(id, handle)
    }

    /// Reload the cache from the backing store, after all earlier commits
    pub fn reload(&self) -> Result<()> {
        self.request(|done| Request::Reload { done })
    }

    /// Block until every earlier commit is applied or failed, then sync
    pub fn barrier(&self) -> Result<()> {
        self.request(|done| Request::Barrier { done })
    }

    /// Compact the backing store, after all earlier commits
    pub fn compact(&self) -> Result<()> {
        self.request(|done| Request::Compact { done })
    }

    /// Fail if the data key was lost
    pub fn check_fatal(&self) -> Result<()> {
        self.fatal.check()
    }

    /// Transactions committed but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Drain the queue and stop the writer thread
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = self.sender.send(Request::Shutdown);
        if worker.join().is_err() {
            tracing::error!("Writer thread panicked");
        }
    }

    fn request(&self, make: impl FnOnce(Sender<Result<()>>) -> Request) -> Result<()> {
        self.fatal.check()?;

        let (done, reply) = channel::bounded(1);
        self.sender
            .send(make(done))
            .map_err(|_| StoreError::WriterUnavailable)?;
        reply.recv().map_err(|_| StoreError::WriterUnavailable)?
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State owned by the writer thread
struct Writer {
    backing: Box<dyn BackingStore>,
    cache: Arc<Cache>,
    retry_policy: RetryPolicy,
    pending: Arc<AtomicUsize>,
    fatal: Arc<FatalState>,
}

impl Writer {
    fn run(mut self, requests: Receiver<Request>) {
        tracing::debug!("Writer thread started");

        for request in requests.iter() {
            match request {
                Request::Commit {
                    id,
                    operations,
                    done,
                } => {
                    let result = self.commit(id, &operations);
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    // The caller may have dropped its handle
                    let _ = done.send(result);
                }
                Request::Reload { done } => {
                    let result = self.guarded(|w| w.reload());
                    let _ = done.send(result);
                }
                Request::Barrier { done } => {
                    let result =
                        self.guarded(|w| w.retrying(format_args!("barrier sync"), |b| b.sync()));
                    let _ = done.send(result);
                }
                Request::Compact { done } => {
                    let result = self.guarded(|w| w.backing.compact());
                    let _ = done.send(result);
                }
                Request::Shutdown => break,
            }
        }

        if self.fatal.check().is_ok() {
            if let Err(e) = self.retrying(format_args!("final sync"), |b| b.sync()) {
                tracing::warn!("Final sync on shutdown failed: {}", e);
            }
        }
        tracing::debug!("Writer thread stopped");
    }

    /// Run `op` unless the store is already dead, recording fatal outcomes
    fn guarded(&mut self, op: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.fatal.check()?;
        let result = op(self);
        if let Err(e) = &result {
            self.record_failure(e);
        }
        result
    }

    fn commit(&mut self, id: u64, operations: &[Operation]) -> Result<()> {
        self.fatal.check()?;
        if operations.is_empty() {
            return Ok(());
        }

        match self.retrying(format_args!("transaction {}", id), |b| b.apply_batch(operations)) {
            Ok(()) => {
                // Copy-on-write over the previous snapshot; an unloaded cache
                // picks the batch up on its next reload instead
                if let Some(current) = self.cache.current() {
                    self.cache.publish(Arc::new(current.apply(operations)));
                }
                tracing::trace!("Applied transaction {}", id);
                Ok(())
            }
            Err(e) => {
                self.record_failure(&e);
                tracing::warn!("Transaction {} failed: {}", id, e);
                Err(e)
            }
        }
    }

    /// Run `op` against the backing store, retrying transient I/O failures
    /// with the configured backoff
    fn retrying(
        &mut self,
        what: fmt::Arguments<'_>,
        mut op: impl FnMut(&mut dyn BackingStore) -> Result<()>,
    ) -> Result<()> {
        let mut attempt = 1;
        loop {
            match op(self.backing.as_mut()) {
                Ok(()) => return Ok(()),
                Err(StoreError::Io(source)) => {
                    if attempt >= self.retry_policy.max_attempts {
                        return Err(StoreError::RetriesExhausted {
                            attempts: attempt,
                            source,
                        });
                    }
                    let delay = self.retry_policy.backoff_for(attempt);
                    tracing::warn!(
                        "Transient failure in {} (attempt {}/{}), retrying in {:?}: {}",
                        what,
                        attempt,
                        self.retry_policy.max_attempts,
                        delay,
                        source
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn reload(&mut self) -> Result<()> {
        let snapshot = self.backing.read_all()?;
        tracing::debug!("Reloaded cache with {} keys", snapshot.len());
        self.cache.publish(Arc::new(snapshot));
        Ok(())
    }

    fn record_failure(&self, error: &StoreError) {
        if let StoreError::KeyCustodyLost(reason) = error {
            if self.fatal.set(reason) {
                tracing::error!("Key custody lost, refusing all further work: {}", reason);
            }
        }
    }
}
