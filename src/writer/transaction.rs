//! Write transactions
//!
//! Mutations are staged locally and become visible only after commit.

use crate::error::Result;
use crate::value::Value;
use crate::wal::Operation;

use super::{WriteHandle, WriteQueue};

/// A batch of staged mutations
///
/// Committing consumes the transaction, so it can never be reused. Dropping
/// it without committing abandons every staged operation.
pub struct WriteTransaction<'a> {
    queue: &'a WriteQueue,
    operations: Vec<Operation>,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(queue: &'a WriteQueue) -> Self {
        Self {
            queue,
            operations: Vec::new(),
        }
    }

    /// Stage `key = value`
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.operations.push(Operation::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Stage removal of `key`
    pub fn remove(&mut self, key: impl Into<String>) -> &mut Self {
        self.operations.push(Operation::Remove { key: key.into() });
        self
    }

    /// Staged operations, in order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Enqueue the batch and return immediately
    pub fn commit(mut self) -> WriteHandle {
        let operations = std::mem::take(&mut self.operations);
        self.queue.submit(operations)
    }

    /// Enqueue the batch and block until it is applied or has failed
    pub fn commit_and_wait(self) -> Result<()> {
        self.commit().wait()
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.operations.is_empty() {
            tracing::trace!(
                "Abandoned write transaction with {} staged operations",
                self.operations.len()
            );
        }
    }
}
