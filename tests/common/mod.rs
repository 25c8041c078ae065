//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use depotkv::config::{Config, SyncStrategy};
use depotkv::{Depot, OpenMode};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness (filter with RUST_LOG)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Small directory, fsync on every write
pub fn test_config(buckets: u64) -> Config {
    Config::builder()
        .initial_buckets(buckets)
        .sync_strategy(SyncStrategy::EveryWrite)
        .build()
}

/// Path of a depot file inside `temp_dir`
pub fn depot_path(temp_dir: &TempDir, name: &str) -> PathBuf {
    temp_dir.path().join(name)
}

/// Create a fresh writable depot in a temporary directory
pub fn setup_temp_depot_with_config(name: &str, config: Config) -> (TempDir, Depot) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let depot = Depot::open_with_config(
        depot_path(&temp_dir, name),
        OpenMode::ReadWriteCreate,
        config,
    )
    .unwrap();
    (temp_dir, depot)
}

/// Copy of the file as a crash would leave it: whatever is on disk right now
pub fn crash_image(temp_dir: &TempDir, name: &str, copy_name: &str) -> PathBuf {
    let copy = depot_path(temp_dir, copy_name);
    std::fs::copy(depot_path(temp_dir, name), &copy).unwrap();
    copy
}
