//! # DepotKV
//!
//! An embedded, single-file, persistent key-value store with:
//! - Byte-string keys and values, no size limit short of 4 GiB per record
//! - Hash directory with bucket chains and automatic doubling
//! - Free-space reuse with coalescing, plus explicit compaction
//! - Copy-on-write updates and recovery after an unclean shutdown
//! - Single-writer/multi-reader concurrency model (advisory file lock)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Depot                                │
//! │        (open modes, CRUD, cursors, close, compaction)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────────┐
//!          │            │                     │
//!          ▼            ▼                     ▼
//!   ┌─────────────┐ ┌─────────────┐   ┌─────────────┐
//!   │  Directory  │ │   Record    │   │  Allocator  │
//!   │  (chains)   │ │   (codec)   │   │ (free list) │
//!   └──────┬──────┘ └──────┬──────┘   └──────┬──────┘
//!          └───────────────┼─────────────────┘
//!                          ▼
//!                  ┌───────────────┐
//!                  │   DepotFile   │
//!                  │ (header, lock)│
//!                  └───────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use depotkv::{Depot, OpenMode};
//!
//! # fn main() -> depotkv::Result<()> {
//! let mut depot = Depot::open("fruit.depot", OpenMode::ReadWriteCreate)?;
//! depot.put(b"apple", b"red")?;
//! assert_eq!(depot.get(b"apple")?, b"red");
//! depot.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod storage;
pub mod directory;
pub mod cursor;
pub mod depot;
mod compaction;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DepotError, Result};
pub use config::{Config, SyncStrategy, MAX_BUCKETS};
pub use cursor::{Cursor, Items, Keys, Values};
pub use depot::{Depot, DepotStats, OpenMode, SharedDepot};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of DepotKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
