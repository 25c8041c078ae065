//! Storage Module
//!
//! The backing file and the bookkeeping of its regions.
//!
//! ## Responsibilities
//! - Positional I/O over the single backing file
//! - Advisory single-writer lock
//! - Header encoding and validation
//! - Free/used range tracking for the data region
//! - Recovery after an unclean shutdown
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Header (64 bytes)                      │
//! │ ┌──────────┬──────────┬──────────────┐ │
//! │ │Magic (8) │Version(2)│ Flags, Counts│ │
//! │ └──────────┴──────────┴──────────────┘ │
//! ├────────────────────────────────────────┤
//! │ Directory                              │
//! │   bucket_count × chain head (u64)      │
//! ├────────────────────────────────────────┤
//! │ Data Region                            │
//! │   records, tombstones and free gaps    │
//! ├────────────────────────────────────────┤
//! │ Free-List Snapshot (clean close only)  │
//! └────────────────────────────────────────┘
//! ```

mod allocator;
mod file;
mod header;
mod lock;
mod recovery;

pub use allocator::{align_up, Allocation, Allocator, FreeListSnapshot, MIN_FREE_RANGE};
pub use file::DepotFile;
pub use header::{Header, BUCKET_SLOT_SIZE, HEADER_SIZE, MAGIC, VERSION};
pub use lock::WriteLock;
pub use recovery::{DepotRecovery, RecoveryResult};
