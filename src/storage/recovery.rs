//! Depot Recovery
//!
//! Rebuilds the in-memory counters and free list of a file that was not
//! closed cleanly.
//!
//! Everything reachable from the directory is live; everything else in the
//! data region is free. That reclaims records a crashed `put` wrote but never
//! linked, and regions a crashed `delete` unlinked but never freed.

use crate::directory::{read_record, Directory};
use crate::error::Result;

use super::allocator::Allocator;
use super::DepotFile;

/// Outcome of a recovery scan
#[derive(Debug)]
pub struct RecoveryResult {
    /// Live records reachable from the directory
    pub records_recovered: u64,

    /// Tombstoned records still linked into a chain
    pub tombstones_linked: u64,

    /// Bytes of the data region that were unreachable and are now free
    pub bytes_reclaimed: u64,

    /// End of the data region after recovery
    pub data_end: u64,
}

/// Handles recovery after a crash
pub struct DepotRecovery;

impl DepotRecovery {
    /// Walk every chain, verify each record, and rebuild the allocator
    ///
    /// This will:
    /// 1. Decode and checksum every reachable record
    /// 2. Count the live ones
    /// 3. Treat every unreachable byte of the data region as free
    pub fn scan(file: &DepotFile, directory: &Directory) -> Result<(Allocator, RecoveryResult)> {
        let mut used = Vec::new();
        let mut records_recovered = 0;
        let mut tombstones_linked = 0;

        for bucket in 0..directory.bucket_count() as usize {
            for entry in directory.chain(file, bucket)? {
                let entry = entry?;

                if entry.header.live {
                    // Checksum failures surface here instead of on first read
                    read_record(file, &entry)?;
                    records_recovered += 1;
                } else {
                    tombstones_linked += 1;
                }

                used.push((entry.offset, entry.header.region as u64));
            }
        }

        let allocator = Allocator::from_used(directory.data_start(), used)?;
        let result = RecoveryResult {
            records_recovered,
            tombstones_linked,
            bytes_reclaimed: allocator.free_bytes(),
            data_end: allocator.end(),
        };

        Ok((allocator, result))
    }
}
