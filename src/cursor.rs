//! Cursor Module
//!
//! Resumable traversal over all live entries, bucket by bucket and in chain
//! order within a bucket.
//!
//! ## Guarantees Under Concurrent Mutation
//! A cursor remembers its bucket and the keys it has already yielded from
//! that bucket, not a file offset. Between steps the depot may be mutated
//! through the same handle:
//! - keys present for the whole traversal are yielded exactly once
//! - a deleted key that has not been reached yet is not yielded
//! - keys inserted mid-traversal may or may not be yielded
//!
//! Neither `compact()` nor directory growth rebuilds the file while a cursor
//! is active, so mutations never break a traversal. A cursor stepped with a
//! handle other than the one that created it, or one whose layout generation
//! no longer matches, fails with `IteratorInvalidated`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::depot::{Depot, DepotInner};
use crate::directory::read_record;
use crate::error::{DepotError, Result};
use crate::record::{Record, RECORD_HEADER_SIZE};

// =============================================================================
// Registry
// =============================================================================

/// Counts the unfinished cursors of one handle
#[derive(Debug, Default)]
pub(crate) struct CursorRegistry {
    active: AtomicUsize,
}

impl CursorRegistry {
    /// Cursors created and not yet exhausted or dropped
    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Keeps a cursor registered until it is exhausted or dropped
#[derive(Debug)]
struct CursorGuard {
    registry: Arc<CursorRegistry>,
}

impl CursorGuard {
    fn new(registry: Arc<CursorRegistry>) -> Self {
        registry.active.fetch_add(1, Ordering::AcqRel);
        Self { registry }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.registry.active.fetch_sub(1, Ordering::AcqRel);
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Position of a traversal, advanced with `Depot::next_key` and friends
///
/// ## Example
/// ```no_run
/// # use depotkv::{Depot, OpenMode};
/// # fn main() -> depotkv::Result<()> {
/// let depot = Depot::open("fruit.depot", OpenMode::ReadOnly)?;
/// let mut cursor = depot.iterate()?;
/// while let Some(key) = depot.next_key(&mut cursor)? {
///     println!("{}", String::from_utf8_lossy(&key));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Cursor {
    /// `None` once exhausted
    guard: Option<CursorGuard>,

    /// Layout generation the cursor was created under
    generation: u64,

    /// Bucket currently being walked
    bucket: usize,

    /// Keys already yielded from `bucket`
    yielded: Vec<Vec<u8>>,
}

impl Cursor {
    pub(crate) fn new(registry: Arc<CursorRegistry>, generation: u64) -> Self {
        Self {
            guard: Some(CursorGuard::new(registry)),
            generation,
            bucket: 0,
            yielded: Vec::new(),
        }
    }

    /// Whether the traversal has ended
    pub fn is_exhausted(&self) -> bool {
        self.guard.is_none()
    }

    /// Yield the next live record, or `None` at the end
    pub(crate) fn advance(&mut self, inner: &DepotInner) -> Result<Option<Record>> {
        let guard = match &self.guard {
            Some(guard) => guard,
            None => return Ok(None),
        };
        if !Arc::ptr_eq(&guard.registry, &inner.cursors) || self.generation != inner.generation {
            return Err(DepotError::IteratorInvalidated);
        }

        let bucket_count = inner.directory.bucket_count() as usize;
        while self.bucket < bucket_count {
            for entry in inner.directory.chain(&inner.file, self.bucket)? {
                let entry = entry?;
                if !entry.header.live {
                    continue;
                }

                let key = inner
                    .file
                    .read_vec(entry.offset + RECORD_HEADER_SIZE, entry.header.key_len as usize)?;
                if self.yielded.contains(&key) {
                    continue;
                }

                let record = read_record(&inner.file, &entry)?;
                self.yielded.push(key);
                return Ok(Some(record));
            }

            self.bucket += 1;
            self.yielded.clear();
        }

        // Exhausted: unregister so compaction is allowed again
        self.guard = None;
        Ok(None)
    }
}

// =============================================================================
// Iterator Adapters
// =============================================================================

macro_rules! cursor_iter {
    ($(#[$doc:meta])* $name:ident, $item:ty, $map:expr) => {
        $(#[$doc])*
        pub struct $name<'a> {
            depot: &'a Depot,
            cursor: Cursor,
            failed: bool,
        }

        impl<'a> $name<'a> {
            pub(crate) fn new(depot: &'a Depot, cursor: Cursor) -> Self {
                Self {
                    depot,
                    cursor,
                    failed: false,
                }
            }
        }

        impl<'a> Iterator for $name<'a> {
            type Item = Result<$item>;

            fn next(&mut self) -> Option<Self::Item> {
                if self.failed {
                    return None;
                }
                let step = self
                    .depot
                    .inner()
                    .and_then(|inner| self.cursor.advance(inner));
                match step {
                    Ok(record) => record.map($map).map(Ok),
                    Err(e) => {
                        self.failed = true;
                        Some(Err(e))
                    }
                }
            }
        }
    };
}

cursor_iter!(
    /// Iterator over keys, from [`Depot::iterate_keys`]
    Keys,
    Vec<u8>,
    |r: Record| r.key
);

cursor_iter!(
    /// Iterator over (key, value) pairs, from [`Depot::iterate_items`]
    Items,
    (Vec<u8>, Vec<u8>),
    |r: Record| (r.key, r.value)
);

cursor_iter!(
    /// Iterator over values, from [`Depot::iterate_values`]
    Values,
    Vec<u8>,
    |r: Record| r.value
);
