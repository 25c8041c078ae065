//! Configuration for DepotKV
//!
//! Centralized configuration with sensible defaults.

use crate::error::{DepotError, Result};

/// Largest bucket count a depot may have, created or grown
///
/// Keeps the directory size (8 bytes per bucket) far from `u64` overflow.
pub const MAX_BUCKETS: u64 = 1 << 40;

/// Tunables for a depot handle
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Directory Configuration
    // -------------------------------------------------------------------------
    /// Bucket count of a freshly created depot.
    /// Ignored when an existing file is opened (the file's own count wins).
    pub initial_buckets: u64,

    /// Records per bucket above which the directory doubles
    pub max_load_factor: f64,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the backing file
    pub sync_strategy: SyncStrategy,
}

/// Sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync around every pointer swing (safest, slowest)
    EveryWrite,

    /// fsync after N mutations (balanced durability/performance)
    EveryNWrites { count: usize },

    /// fsync only on `sync()` and `close()`
    OnClose,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_buckets: 1024,
            max_load_factor: 2.0,
            sync_strategy: SyncStrategy::EveryNWrites { count: 100 },
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the depot cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.initial_buckets == 0 {
            return Err(DepotError::Config(
                "initial_buckets must be at least 1".to_string(),
            ));
        }

        if self.initial_buckets > MAX_BUCKETS {
            return Err(DepotError::Config(format!(
                "initial_buckets must be at most {}, got {}",
                MAX_BUCKETS, self.initial_buckets
            )));
        }

        if !self.max_load_factor.is_finite() || self.max_load_factor <= 0.0 {
            return Err(DepotError::Config(format!(
                "max_load_factor must be a positive number, got {}",
                self.max_load_factor
            )));
        }

        if let SyncStrategy::EveryNWrites { count: 0 } = self.sync_strategy {
            return Err(DepotError::Config(
                "EveryNWrites count must be at least 1".to_string(),
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
    /// Set the bucket count used when a new depot file is created
    pub fn initial_buckets(mut self, buckets: u64) -> Self {
        self.config.initial_buckets = buckets;
        self
    }

    /// Set the load factor that triggers directory doubling
    pub fn max_load_factor(mut self, factor: f64) -> Self {
        self.config.max_load_factor = factor;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
