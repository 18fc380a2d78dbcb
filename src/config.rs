//! Configuration for SealKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Main configuration for a SealKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (encrypted batch log)
    ///     └── snapshot.db      (encrypted checkpoint image)
    pub data_dir: PathBuf,

    /// Number of WAL records after which the log is folded into the snapshot
    pub compaction_threshold: usize,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the WAL
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Writer Configuration
    // -------------------------------------------------------------------------
    /// Backoff policy for transient I/O failures
    pub retry_policy: RetryPolicy,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every batch (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced batches; the write barrier always syncs
    EveryNBatches { count: usize },
}

/// Bounded exponential backoff for transient write failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_backoff: Duration,

    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./sealkv_data"),
            compaction_threshold: 1000,
            sync_strategy: SyncStrategy::EveryWrite,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retry_policy.max_attempts == 0 {
            return Err(StoreError::Config(
                "retry_policy.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.compaction_threshold == 0 {
            return Err(StoreError::Config(
                "compaction_threshold must be at least 1".to_string(),
            ));
        }
        if let SyncStrategy::EveryNBatches { count: 0 } = self.sync_strategy {
            return Err(StoreError::Config(
                "EveryNBatches count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the retry policy for transient write failures
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    /// Set the number of WAL records that triggers compaction
    pub fn compaction_threshold(mut self, records: usize) -> Self {
        self.config.compaction_threshold = records;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
