//! Completion handles for committed transactions

use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;

use crate::error::{Result, StoreError};

/// Where a committed transaction currently stands
#[derive(Debug, Clone)]
pub enum WriteStatus {
    /// Still queued or being applied
    Pending,

    /// Durably applied and visible to readers
    Applied,

    /// Terminally failed; nothing from the transaction was applied
    Failed(StoreError),
}

/// Eventual completion of a committed transaction
///
/// Dropping the handle does not cancel the write; the transaction is applied
/// either way. Once a terminal status is observed it is kept, so every later
/// poll or wait reports the same outcome.
#[derive(Debug)]
pub struct WriteHandle {
    id: u64,
    done: Receiver<Result<()>>,

    /// Terminal outcome, once received from the writer
    outcome: Mutex<Option<Result<()>>>,
}

impl WriteHandle {
    pub(crate) fn new(id: u64, done: Receiver<Result<()>>) -> Self {
        Self {
            id,
            done,
            outcome: Mutex::new(None),
        }
    }

    /// Queue position assigned at commit time
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the transaction is applied or has failed
    pub fn wait(self) -> Result<()> {
        if let Some(outcome) = self.outcome.into_inner() {
            return outcome;
        }
        self.done.recv().map_err(|_| StoreError::WriterUnavailable)?
    }

    /// Block for at most `timeout`; `None` if still pending
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        let mut outcome = self.outcome.lock();
        if outcome.is_none() {
            *outcome = match self.done.recv_timeout(timeout) {
                Ok(result) => Some(result),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => Some(Err(StoreError::WriterUnavailable)),
            };
        }
        outcome.clone()
    }

    /// Non-blocking poll
    pub fn try_status(&self) -> WriteStatus {
        let mut outcome = self.outcome.lock();
        if outcome.is_none() {
            *outcome = match self.done.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => return WriteStatus::Pending,
                Err(TryRecvError::Disconnected) => Some(Err(StoreError::WriterUnavailable)),
            };
        }

        match outcome.as_ref() {
            Some(Ok(())) => WriteStatus::Applied,
            Some(Err(e)) => WriteStatus::Failed(e.clone()),
            None => WriteStatus::Pending,
        }
    }
}
