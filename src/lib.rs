//! # SealKV
//!
//! An encrypted, cached key-value store for application settings with:
//! - Immutable cache snapshots for lock-free-feeling reads
//! - A single writer thread applying transactions in commit order
//! - Atomic multi-key batches backed by an encrypted WAL
//! - A write barrier for the crash/shutdown path
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Value Groups                             │
//! │          (registration, PIN, remote config, ...)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   KeyValueStore                              │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │ get                     │ commit
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Cache    │◀─publish─│ WriteQueue  │
//!   │ (Snapshot)  │          │  (thread)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │ BackingStore│
//!                           │ (WAL + Snap)│
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod value;

pub mod cache;
pub mod crypto;
pub mod registry;
pub mod storage;
pub mod store;
pub mod wal;
pub mod writer;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, RetryPolicy, SyncStrategy};
pub use error::{Result, StoreError};
pub use registry::{StoreContext, ValueGroup};
pub use store::KeyValueStore;
pub use value::{FromValue, Value, ValueType};
pub use wal::Operation;
pub use writer::{WriteHandle, WriteStatus, WriteTransaction};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SealKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
