//! Writer Module
//!
//! Serializes every mutation through one dedicated thread.
//!
//! ## Responsibilities
//! - Accept committed transactions from any number of callers
//! - Apply them to the backing store one at a time, in commit order
//! - Retry transient I/O failures with bounded backoff
//! - Publish a new cache snapshot after each applied batch
//! - Serve cache reloads and write barriers in queue order
//!
//! ## Queue Entries
//! ```text
//!   callers ──commit──┐
//!   readers ──reload──┼──▶ FIFO channel ──▶ writer thread ──▶ BackingStore
//!   barrier ──drain───┘                           │
//!                                                 └──publish──▶ Cache
//! ```

mod handle;
mod queue;
mod transaction;

pub use handle::{WriteHandle, WriteStatus};
pub use queue::WriteQueue;
pub use transaction::WriteTransaction;
