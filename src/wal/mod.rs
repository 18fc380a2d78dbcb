//! Write-Ahead Log (WAL) Module
//!
//! Durable, encrypted log of committed batches.
//!
//! ## Responsibilities
//! - Append one sealed record per committed batch
//! - CRC32 checksums for torn-write detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1 (one batch)                    │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Sealed │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Sealed │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The CRC covers the sealed payload. A CRC failure means a torn write; an
//! intact record that fails authentication means the key is wrong.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{compute_crc, Operation, WalEntry, HEADER_SIZE, MAX_RECORD_SIZE};
pub use reader::{ReadOutcome, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
