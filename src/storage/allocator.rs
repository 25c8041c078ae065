//! Block Allocator
//!
//! Tracks which byte ranges of the data region are free.
//!
//! ## Allocation Strategy
//! 1. Best fit: the smallest free range that can hold the request. The
//!    remainder is split off when it can still hold a minimal record.
//! 2. Grow in place: if the last free range touches the end of the data
//!    region, it is extended rather than stranded behind a new allocation.
//! 3. Otherwise the data region is extended.
//!
//! ## Freeing
//! Freed ranges are coalesced with their free neighbours. A range that
//! overlaps anything already free is rejected as corruption, which keeps free
//! and used ranges disjoint.
//!
//! The allocator is purely in-memory bookkeeping; the file is touched by the
//! caller. Its state is persisted on clean close as a [`FreeListSnapshot`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{DepotError, Result};
use crate::record::{RECORD_ALIGN, RECORD_HEADER_SIZE};

/// Smallest leftover worth keeping as a separate free range
pub const MIN_FREE_RANGE: u64 = RECORD_HEADER_SIZE + RECORD_ALIGN;

/// A region handed out by [`Allocator::allocate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Start of the region
    pub offset: u64,
    /// Usable length (may exceed the request when a small remainder is absorbed)
    pub len: u64,
}

/// Persisted form of the free list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeListSnapshot {
    /// End of the data region when the snapshot was taken
    pub data_end: u64,
    /// Free ranges as (offset, len), sorted by offset
    pub ranges: Vec<(u64, u64)>,
}

impl FreeListSnapshot {
    /// Serialize with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| DepotError::corrupt(format!("free list encode failed: {}", e)))
    }

    /// Deserialize with bincode
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| DepotError::corrupt(format!("free list decode failed: {}", e)))
    }
}

/// Free-space tracker for the data region
#[derive(Debug, Clone)]
pub struct Allocator {
    /// First byte of the data region
    data_start: u64,
    /// One past the last byte of the data region
    end: u64,
    /// Free ranges keyed by offset → length
    by_offset: BTreeMap<u64, u64>,
    /// Free ranges ordered by (length, offset) for best fit
    by_size: BTreeSet<(u64, u64)>,
    /// Sum of all free range lengths
    free_bytes: u64,
}

impl Allocator {
    /// Empty data region starting (and ending) at `data_start`
    pub fn new(data_start: u64) -> Self {
        Self::with_end(data_start, data_start)
    }

    /// Fully used data region `[data_start, end)`
    pub fn with_end(data_start: u64, end: u64) -> Self {
        Self {
            data_start,
            end: end.max(data_start),
            by_offset: BTreeMap::new(),
            by_size: BTreeSet::new(),
            free_bytes: 0,
        }
    }

    /// Rebuild from the set of used regions
    ///
    /// Everything between `data_start` and the end of the last used region
    /// that is not covered by a used region becomes free.
    pub fn from_used(data_start: u64, mut used: Vec<(u64, u64)>) -> Result<Self> {
        used.sort_unstable();

        let mut allocator = Self::new(data_start);
        let mut cursor = data_start;

        for (offset, len) in used {
            if offset < cursor {
                return Err(DepotError::corrupt(format!(
                    "used region at {} overlaps the previous region ending at {}",
                    offset, cursor
                )));
            }
            if offset > cursor {
                allocator.insert_free(cursor, offset - cursor);
            }
            cursor = offset + len;
        }

        allocator.end = cursor;
        Ok(allocator)
    }

    /// Restore from a persisted snapshot, validating every range
    pub fn from_snapshot(data_start: u64, snapshot: &FreeListSnapshot) -> Result<Self> {
        let mut allocator = Self::with_end(data_start, snapshot.data_end);
        if snapshot.data_end < data_start {
            return Err(DepotError::corrupt("free list ends before the data region"));
        }

        let mut last_end = data_start;
        for &(offset, len) in &snapshot.ranges {
            let out_of_bounds = offset
                .checked_add(len)
                .map_or(true, |end| end > snapshot.data_end);
            if len == 0 || offset < last_end || out_of_bounds {
                return Err(DepotError::corrupt(format!(
                    "free list range ({}, {}) is out of order or out of bounds",
                    offset, len
                )));
            }
            allocator.insert_free(offset, len);
            last_end = offset + len;
        }

        Ok(allocator)
    }

    /// Snapshot for persistence
    pub fn snapshot(&self) -> FreeListSnapshot {
        FreeListSnapshot {
            data_end: self.end,
            ranges: self.by_offset.iter().map(|(&o, &l)| (o, l)).collect(),
        }
    }

    /// Allocate `size` bytes
    pub fn allocate(&mut self, size: u64) -> Allocation {
        let size = align_up(size.max(1));

        // Best fit: smallest range with len >= size
        if let Some(&(len, offset)) = self.by_size.range((size, 0)..).next() {
            self.remove_free(offset, len);

            let leftover = len - size;
            if leftover >= MIN_FREE_RANGE {
                self.insert_free(offset + size, leftover);
                return Allocation { offset, len: size };
            }
            return Allocation { offset, len };
        }

        // Grow the trailing free range in place
        if let Some((&offset, &len)) = self.by_offset.iter().next_back() {
            if offset + len == self.end {
                self.remove_free(offset, len);
                self.end = offset + size;
                return Allocation { offset, len: size };
            }
        }

        let offset = self.end;
        self.end += size;
        Allocation { offset, len: size }
    }

    /// Return a region to the free list, merging with adjacent free ranges
    pub fn free(&mut self, offset: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }

        if offset < self.data_start || offset + len > self.end {
            return Err(DepotError::corrupt(format!(
                "free of ({}, {}) outside data region [{}, {})",
                offset, len, self.data_start, self.end
            )));
        }

        let mut start = offset;
        let mut length = len;

        // Left neighbour
        if let Some((&prev_off, &prev_len)) = self.by_offset.range(..=offset).next_back() {
            let prev_end = prev_off + prev_len;
            if prev_end > offset {
                return Err(DepotError::corrupt(format!(
                    "double free: ({}, {}) overlaps free range ({}, {})",
                    offset, len, prev_off, prev_len
                )));
            }
            if prev_end == offset {
                self.remove_free(prev_off, prev_len);
                start = prev_off;
                length += prev_len;
            }
        }

        // Right neighbour
        if let Some((&next_off, &next_len)) = self.by_offset.range(offset..).next() {
            if next_off < offset + len {
                return Err(DepotError::corrupt(format!(
                    "double free: ({}, {}) overlaps free range ({}, {})",
                    offset, len, next_off, next_len
                )));
            }
            if next_off == offset + len {
                self.remove_free(next_off, next_len);
                length += next_len;
            }
        }

        self.insert_free(start, length);
        Ok(())
    }

    /// Drop a free range that touches the end of the data region
    ///
    /// Returns the new end, which the caller may truncate the file to.
    pub fn trim_tail(&mut self) -> u64 {
        if let Some((&offset, &len)) = self.by_offset.iter().next_back() {
            if offset + len == self.end {
                self.remove_free(offset, len);
                self.end = offset;
            }
        }
        self.end
    }

    /// First byte of the data region
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// One past the last allocated or free byte
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Total free bytes
    pub fn free_bytes(&self) -> u64 {
        self.free_bytes
    }

    /// Number of disjoint free ranges
    pub fn free_ranges(&self) -> usize {
        self.by_offset.len()
    }

    /// Bytes of the data region currently handed out
    pub fn used_bytes(&self) -> u64 {
        self.end - self.data_start - self.free_bytes
    }

    /// Share of the data region that is free, in `[0.0, 1.0]`
    pub fn fragmentation(&self) -> f64 {
        let total = self.end - self.data_start;
        if total == 0 {
            return 0.0;
        }
        self.free_bytes as f64 / total as f64
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn insert_free(&mut self, offset: u64, len: u64) {
        self.by_offset.insert(offset, len);
        self.by_size.insert((len, offset));
        self.free_bytes += len;
    }

    fn remove_free(&mut self, offset: u64, len: u64) {
        self.by_offset.remove(&offset);
        self.by_size.remove(&(len, offset));
        self.free_bytes -= len;
    }
}

/// Round up to the record alignment
pub fn align_up(n: u64) -> u64 {
    (n + RECORD_ALIGN - 1) & !(RECORD_ALIGN - 1)
}
