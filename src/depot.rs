//! Depot Module
//!
//! The store facade that coordinates all components.
//!
//! ## Responsibilities
//! - Open/close lifecycle and the single-writer lock
//! - CRUD routed through the directory, allocator and record codec
//! - Open-mode access rules
//! - Recovery of files that were not closed cleanly

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, SyncStrategy};
use crate::cursor::{Cursor, CursorRegistry, Items, Keys, Values};
use crate::directory::{read_record, short_hash, ChainEntry, Directory};
use crate::error::{DepotError, Result};
use crate::record::{
    self, Record, MARKER_FIELD_OFFSET, MAX_RECORD_SIZE, TOMBSTONE_MARKER,
};
use crate::storage::{
    Allocator, DepotFile, DepotRecovery, FreeListSnapshot, Header, WriteLock, HEADER_SIZE,
};

/// A depot handle shared between threads behind one mutex
pub type SharedDepot = Arc<Mutex<Depot>>;

// =============================================================================
// Open Mode
// =============================================================================

/// How a depot file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read only; the file must exist
    ReadOnly,
    /// Read / write; the file must exist
    ReadWrite,
    /// Read / write; create the file if it does not exist
    ReadWriteCreate,
    /// Read / write; always start from an empty depot
    ReadWriteTruncate,
}

impl OpenMode {
    /// Whether handles opened in this mode may mutate the depot
    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::ReadOnly)
    }
}

impl FromStr for OpenMode {
    type Err = DepotError;

    /// Parse the classic single-letter flags: `r`, `w`, `c`, `n`
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(OpenMode::ReadOnly),
            "w" => Ok(OpenMode::ReadWrite),
            "c" => Ok(OpenMode::ReadWriteCreate),
            "n" => Ok(OpenMode::ReadWriteTruncate),
            other => Err(DepotError::Config(format!(
                "open flag should be 'r', 'w', 'c', or 'n', got {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpenMode::ReadOnly => "read-only",
            OpenMode::ReadWrite => "read-write",
            OpenMode::ReadWriteCreate => "read-write-create",
            OpenMode::ReadWriteTruncate => "read-write-truncate",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Point-in-time description of a depot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepotStats {
    pub record_count: u64,
    pub bucket_count: u64,
    pub used_buckets: u64,
    pub longest_chain: u64,
    pub load_factor: f64,
    pub file_size: u64,
    /// Bytes held by live records
    pub data_bytes: u64,
    /// Bytes of the data region handed out, including slack in each region
    pub allocated_bytes: u64,
    pub free_bytes: u64,
    pub free_ranges: u64,
    /// Share of the data region that is free
    pub fragmentation: f64,
    pub generation: u64,
    pub active_cursors: u64,
}

// =============================================================================
// Depot
// =============================================================================

/// An open depot
///
/// ## Concurrency Model: Single Writer, Many Readers
///
/// - At most one writable handle per file, enforced by an advisory lock
///   taken at open and released at close. A second writer fails fast with
///   `LockConflict`.
/// - Read-only handles take no lock and may coexist with the writer.
/// - The handle itself does no internal locking: mutations need `&mut self`.
///   Wrap it with [`Depot::into_shared`] to use it from several threads.
pub struct Depot {
    /// Path the depot was opened from
    path: PathBuf,

    /// Mode the depot was opened with
    mode: OpenMode,

    /// Open state; `None` once closed
    inner: Option<DepotInner>,
}

/// Everything owned by an open handle
pub(crate) struct DepotInner {
    pub(crate) config: Config,

    /// Backing file
    pub(crate) file: DepotFile,

    /// Held by writers only
    pub(crate) lock: Option<WriteLock>,

    /// Hash directory (cached heads for writers)
    pub(crate) directory: Directory,

    /// Free/used tracking for the data region
    pub(crate) allocator: Allocator,

    /// Live records, maintained on every mutation
    pub(crate) record_count: u64,

    /// Layout generation, bumped by rebuilds
    pub(crate) generation: u64,

    /// Cursors handed out by this handle
    pub(crate) cursors: Arc<CursorRegistry>,

    /// Mutations since the last fsync
    writes_since_sync: usize,
}

impl Depot {
    /// Open a depot with the default configuration
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with_config(path, mode, Config::default())
    }

    /// Open a depot
    ///
    /// On startup:
    /// 1. Open (or create) the file according to `mode`
    /// 2. Writers take the exclusive lock before touching anything
    /// 3. Validate the header and load the directory
    /// 4. Restore the free list, or rescan after an unclean shutdown
    /// 5. Writers mark the file dirty until close
    pub fn open_with_config(path: impl AsRef<Path>, mode: OpenMode, config: Config) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let inner = match mode {
            OpenMode::ReadOnly => DepotInner::open_reader(&path, config)?,
            OpenMode::ReadWrite => {
                let file = DepotFile::open(&path, true)?;
                DepotInner::open_writer(file, config, false, false)?
            }
            OpenMode::ReadWriteCreate => {
                let file = DepotFile::open_or_create(&path)?;
                DepotInner::open_writer(file, config, true, false)?
            }
            OpenMode::ReadWriteTruncate => {
                let file = DepotFile::open_or_create(&path)?;
                DepotInner::open_writer(file, config, true, true)?
            }
        };

        info!(
            path = %path.display(),
            %mode,
            buckets = inner.directory.bucket_count(),
            records = inner.record_count,
            "depot opened"
        );

        Ok(Self {
            path,
            mode,
            inner: Some(inner),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get the value stored under `key`
    ///
    /// Fails with `KeyNotFound` when the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.inner()?.lookup(key)?.map(|r| r.value).ok_or(DepotError::KeyNotFound)
    }

    /// Get the value stored under `key`, or `default` when it is absent
    ///
    /// Never fails because of a missing key.
    pub fn get_or(&self, key: &[u8], default: &[u8]) -> Result<Vec<u8>> {
        match self.get(key) {
            Ok(value) => Ok(value),
            Err(DepotError::KeyNotFound) => Ok(default.to_vec()),
            Err(e) => Err(e),
        }
    }

    /// Check whether `key` is present
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        let inner = self.inner()?;
        Ok(inner.directory.find(&inner.file, key)?.found.is_some())
    }

    /// Length of the value stored under `key`, without reading it
    pub fn value_len(&self, key: &[u8]) -> Result<usize> {
        let inner = self.inner()?;
        inner
            .directory
            .find(&inner.file, key)?
            .found
            .map(|entry| entry.header.val_len as usize)
            .ok_or(DepotError::KeyNotFound)
    }

    /// Number of live records (O(1))
    pub fn count(&self) -> Result<u64> {
        Ok(self.inner()?.record_count)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or replace a record
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.insert(key, value, true)
    }

    /// Insert a record, failing with `KeyExists` if the key is present
    pub fn put_if_absent(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.insert(key, value, false)
    }

    /// Insert a record
    ///
    /// With `overwrite = false` an existing key fails with `KeyExists` and the
    /// depot is left unchanged. Otherwise the new record is written in full
    /// before any pointer references it, so the old value stays readable
    /// until the swap.
    pub fn insert(&mut self, key: &[u8], value: &[u8], overwrite: bool) -> Result<()> {
        let inner = self.writable()?;
        if inner.insert(key, value, overwrite)? {
            inner.grow_if_overloaded();
        }
        Ok(())
    }

    /// Return the value under `key`, inserting `default` first if it is absent
    pub fn set_default(&mut self, key: &[u8], default: &[u8]) -> Result<Vec<u8>> {
        if let Some(record) = self.inner()?.lookup(key)? {
            return Ok(record.value);
        }
        self.insert(key, default, false)?;
        Ok(default.to_vec())
    }

    /// Delete a record
    ///
    /// Fails with `KeyNotFound` if the key is absent. The record is unlinked,
    /// tombstoned in place and its region returned to the allocator.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.writable()?.delete(key)
    }

    /// Flush counters to the header and fsync the file
    pub fn sync(&mut self) -> Result<()> {
        let inner = self.writable()?;
        inner.write_header(false, 0, 0)?;
        inner.file.sync()?;
        inner.writes_since_sync = 0;
        Ok(())
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Start a new cursor at the first live entry
    ///
    /// The cursor does not borrow the depot, so the depot may be mutated
    /// between steps; see [`Cursor`] for what that guarantees.
    pub fn iterate(&self) -> Result<Cursor> {
        let inner = self.inner()?;
        Ok(Cursor::new(Arc::clone(&inner.cursors), inner.generation))
    }

    /// Advance a cursor, returning the next key
    pub fn next_key(&self, cursor: &mut Cursor) -> Result<Option<Vec<u8>>> {
        Ok(self.advance(cursor)?.map(|r| r.key))
    }

    /// Advance a cursor, returning the next value
    pub fn next_value(&self, cursor: &mut Cursor) -> Result<Option<Vec<u8>>> {
        Ok(self.advance(cursor)?.map(|r| r.value))
    }

    /// Advance a cursor, returning the next (key, value) pair
    pub fn next_item(&self, cursor: &mut Cursor) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self.advance(cursor)?.map(|r| (r.key, r.value)))
    }

    /// Lazy iterator over all keys
    pub fn iterate_keys(&self) -> Result<Keys<'_>> {
        Ok(Keys::new(self, self.iterate()?))
    }

    /// Lazy iterator over all (key, value) pairs
    pub fn iterate_items(&self) -> Result<Items<'_>> {
        Ok(Items::new(self, self.iterate()?))
    }

    /// Lazy iterator over all values
    pub fn iterate_values(&self) -> Result<Values<'_>> {
        Ok(Values::new(self, self.iterate()?))
    }

    /// Collect every key
    pub fn list_keys(&self) -> Result<Vec<Vec<u8>>> {
        self.iterate_keys()?.collect()
    }

    fn advance(&self, cursor: &mut Cursor) -> Result<Option<Record>> {
        cursor.advance(self.inner()?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the depot
    ///
    /// Writers persist the free list and counters, mark the file clean and
    /// release the lock. The handle is closed even if flushing fails; a
    /// second call fails with `UseAfterClose`.
    pub fn close(&mut self) -> Result<()> {
        let inner = self.inner.take().ok_or(DepotError::UseAfterClose)?;
        inner.finish()?;
        info!(path = %self.path.display(), "depot closed");
        Ok(())
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Wrap the handle for use from several threads
    pub fn into_shared(self) -> SharedDepot {
        Arc::new(Mutex::new(self))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the path the depot was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the open mode
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Get the current bucket count
    pub fn bucket_count(&self) -> Result<u64> {
        Ok(self.inner()?.directory.bucket_count())
    }

    /// Get a stats snapshot (walks every chain)
    pub fn stats(&self) -> Result<DepotStats> {
        self.inner()?.stats()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    pub(crate) fn inner(&self) -> Result<&DepotInner> {
        self.inner.as_ref().ok_or(DepotError::UseAfterClose)
    }

    pub(crate) fn writable(&mut self) -> Result<&mut DepotInner> {
        let inner = self.inner.as_mut().ok_or(DepotError::UseAfterClose)?;
        if inner.lock.is_none() {
            return Err(DepotError::PermissionDenied);
        }
        Ok(inner)
    }
}

impl Drop for Depot {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            if let Err(e) = inner.finish() {
                warn!(path = %self.path.display(), error = %e, "failed to close depot on drop");
            }
        }
    }
}

impl fmt::Debug for Depot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Depot")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// Open State
// =============================================================================

impl DepotInner {
    /// Open a read-only handle
    fn open_reader(path: &Path, config: Config) -> Result<Self> {
        let file = DepotFile::open(path, false)?;
        let header = read_header(&file)?;
        let directory = Directory::load(&file, header.directory_offset(), header.bucket_count, true)?;

        // A dirty header means a writer is active or crashed: count what is reachable now
        let (allocator, record_count) = restore_state(&file, &header, &directory, false)?;

        Ok(Self {
            config,
            file,
            lock: None,
            directory,
            allocator,
            record_count,
            generation: header.generation,
            cursors: Arc::new(CursorRegistry::default()),
            writes_since_sync: 0,
        })
    }

    /// Open a writable handle
    ///
    /// `create` allows an empty file to be initialized; `truncate` discards
    /// any existing content. Both happen only after the lock is held.
    fn open_writer(file: DepotFile, config: Config, create: bool, truncate: bool) -> Result<Self> {
        let lock = WriteLock::acquire(file.as_file(), file.path())?;

        let fresh = truncate || (create && file.is_empty()?);
        let mut inner = if fresh {
            Self::initialize(file, lock, config)?
        } else {
            Self::load_writer(file, lock, config)?
        };

        // Dirty until close: a crash from here on triggers a rescan
        inner.write_header(false, 0, 0)?;
        inner.file.sync()?;
        Ok(inner)
    }

    /// Lay out an empty depot
    fn initialize(file: DepotFile, lock: WriteLock, config: Config) -> Result<Self> {
        file.set_len(0)?;

        let header = Header::new(config.initial_buckets);
        file.write_at(&header.encode(), 0)?;
        let directory = Directory::create(&file, HEADER_SIZE, header.bucket_count)?;
        let allocator = Allocator::new(header.data_start());

        debug!(buckets = header.bucket_count, "initialized new depot");

        Ok(Self {
            config,
            file,
            lock: Some(lock),
            directory,
            allocator,
            record_count: 0,
            generation: 0,
            cursors: Arc::new(CursorRegistry::default()),
            writes_since_sync: 0,
        })
    }

    /// Load an existing depot for writing
    fn load_writer(file: DepotFile, lock: WriteLock, config: Config) -> Result<Self> {
        let header = read_header(&file)?;
        let directory = Directory::load(&file, header.directory_offset(), header.bucket_count, false)?;
        let (allocator, record_count) = restore_state(&file, &header, &directory, true)?;

        Ok(Self {
            config,
            file,
            lock: Some(lock),
            directory,
            allocator,
            record_count,
            generation: header.generation,
            cursors: Arc::new(CursorRegistry::default()),
            writes_since_sync: 0,
        })
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Read the live record for `key`
    pub(crate) fn lookup(&self, key: &[u8]) -> Result<Option<Record>> {
        match self.directory.find(&self.file, key)?.found {
            Some(entry) => Ok(Some(read_record(&self.file, &entry)?)),
            None => Ok(None),
        }
    }

    /// Copy-on-write insert; returns true when a new key was added
    ///
    /// Steps:
    /// 1. Locate the key (and the slot that points at it)
    /// 2. Write the new record into freshly allocated space
    /// 3. Swing the one pointer that makes it reachable
    /// 4. Tombstone and free the replaced record
    fn insert(&mut self, key: &[u8], value: &[u8], overwrite: bool) -> Result<bool> {
        let size = record::record_size(key.len(), value.len());
        if size > MAX_RECORD_SIZE {
            return Err(DepotError::RecordTooLarge { size });
        }

        let lookup = self.directory.find(&self.file, key)?;
        if lookup.found.is_some() && !overwrite {
            return Err(DepotError::KeyExists);
        }

        let next = lookup.found.map_or(0, |entry| entry.header.next);
        let allocation = self.allocator.allocate(size);

        // Step 2: the record is complete on disk before anything points at it
        let written = record::encode(key, value, short_hash(lookup.hash), next, allocation.len)
            .and_then(|bytes| self.file.write_at(&bytes, allocation.offset))
            .and_then(|()| self.barrier());
        if let Err(e) = written {
            self.allocator.free(allocation.offset, allocation.len)?;
            return Err(e);
        }

        // Step 3
        if let Err(e) = self.directory.set_link(&self.file, lookup.link, allocation.offset) {
            self.allocator.free(allocation.offset, allocation.len)?;
            return Err(e);
        }

        // Step 4
        let added = match lookup.found {
            Some(old) => {
                self.release(&old)?;
                false
            }
            None => {
                self.record_count += 1;
                true
            }
        };

        self.after_write()?;
        Ok(added)
    }

    /// Unlink, tombstone and free the record for `key`
    fn delete(&mut self, key: &[u8]) -> Result<()> {
        let lookup = self.directory.find(&self.file, key)?;
        let found = lookup.found.ok_or(DepotError::KeyNotFound)?;

        self.directory.set_link(&self.file, lookup.link, found.header.next)?;
        self.release(&found)?;
        self.record_count = self.record_count.saturating_sub(1);

        self.after_write()
    }

    /// Tombstone an unlinked record and give its region back
    fn release(&mut self, entry: &ChainEntry) -> Result<()> {
        self.file
            .write_at(&TOMBSTONE_MARKER.to_le_bytes(), entry.offset + MARKER_FIELD_OFFSET)?;
        self.allocator.free(entry.offset, entry.header.region as u64)
    }

    /// Whether `record_count` exceeds the load factor for `buckets`
    pub(crate) fn over_load_factor(&self, buckets: u64) -> bool {
        self.record_count as f64 / buckets as f64 > self.config.max_load_factor
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Ordering point between a data write and the pointer swing
    fn barrier(&self) -> Result<()> {
        if self.config.sync_strategy == SyncStrategy::EveryWrite {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Count a mutation and fsync according to the strategy
    fn after_write(&mut self) -> Result<()> {
        match self.config.sync_strategy {
            SyncStrategy::EveryWrite => self.file.sync_data(),
            SyncStrategy::EveryNWrites { count } => {
                self.writes_since_sync += 1;
                if self.writes_since_sync >= count {
                    self.writes_since_sync = 0;
                    self.file.sync_data()?;
                }
                Ok(())
            }
            SyncStrategy::OnClose => Ok(()),
        }
    }

    /// Write the header from the current in-memory state
    pub(crate) fn write_header(&self, clean: bool, freelist_offset: u64, freelist_len: u32) -> Result<()> {
        let header = Header {
            bucket_count: self.directory.bucket_count(),
            record_count: self.record_count,
            data_end: self.allocator.end(),
            generation: self.generation,
            freelist_offset,
            freelist_len,
            clean,
        };
        self.file.write_at(&header.encode(), 0)
    }

    /// Persist everything and release the lock
    ///
    /// Order: free-list snapshot, fsync, clean header, fsync, unlock.
    fn finish(mut self) -> Result<()> {
        if self.lock.is_none() {
            return Ok(());
        }

        let end = self.allocator.trim_tail();
        let snapshot = self.allocator.snapshot();

        let (offset, len) = if snapshot.ranges.is_empty() {
            self.file.set_len(end)?;
            (0, 0)
        } else {
            let bytes = snapshot.to_bytes()?;
            self.file.write_at(&bytes, end)?;
            self.file.set_len(end + bytes.len() as u64)?;
            (end, bytes.len() as u32)
        };
        self.file.sync()?;

        self.write_header(true, offset, len)?;
        self.file.sync()?;

        debug!(
            records = self.record_count,
            free_bytes = self.allocator.free_bytes(),
            "depot flushed on close"
        );

        // Lock goes last, after the clean header is durable
        drop(self.lock.take());
        Ok(())
    }

    // =========================================================================
    // Stats
    // =========================================================================

    fn stats(&self) -> Result<DepotStats> {
        let bucket_count = self.directory.bucket_count();
        let mut used_buckets = 0;
        let mut longest_chain = 0;
        let mut data_bytes = 0;

        for bucket in 0..bucket_count as usize {
            let mut length = 0;
            for entry in self.directory.chain(&self.file, bucket)? {
                let entry = entry?;
                if entry.header.live {
                    length += 1;
                    data_bytes += entry.header.encoded_len();
                }
            }
            if length > 0 {
                used_buckets += 1;
            }
            longest_chain = longest_chain.max(length);
        }

        Ok(DepotStats {
            record_count: self.record_count,
            bucket_count,
            used_buckets,
            longest_chain,
            load_factor: self.record_count as f64 / bucket_count as f64,
            file_size: self.file.len()?,
            data_bytes,
            allocated_bytes: self.allocator.used_bytes(),
            free_bytes: self.allocator.free_bytes(),
            free_ranges: self.allocator.free_ranges() as u64,
            fragmentation: self.allocator.fragmentation(),
            generation: self.generation,
            active_cursors: self.cursors.active() as u64,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Read and validate the header of an open file
fn read_header(file: &DepotFile) -> Result<Header> {
    let file_len = file.len()?;
    if file_len < HEADER_SIZE {
        return Err(DepotError::corrupt(format!(
            "file is {} bytes, too small to hold a depot header",
            file_len
        )));
    }
    let bytes = file.read_vec(0, HEADER_SIZE as usize)?;
    Header::decode(&bytes, file_len)
}

/// Rebuild the allocator and record count of an opened file
///
/// A clean file restores its persisted free list; a dirty file, or a clean
/// one whose free list fails validation, is rescanned from the directory.
fn restore_state(
    file: &DepotFile,
    header: &Header,
    directory: &Directory,
    writer: bool,
) -> Result<(Allocator, u64)> {
    if header.clean {
        match load_free_list(file, header) {
            Ok(allocator) => return Ok((allocator, header.record_count)),
            Err(e) => warn!(error = %e, "free list snapshot rejected, rescanning depot"),
        }
    }

    let (allocator, result) = DepotRecovery::scan(file, directory)?;
    if writer && !header.clean {
        warn!(
            path = %file.path().display(),
            records = result.records_recovered,
            reclaimed_bytes = result.bytes_reclaimed,
            linked_tombstones = result.tombstones_linked,
            "depot was not closed cleanly, recovered from directory scan"
        );
    } else {
        debug!(records = result.records_recovered, "depot rescanned");
    }
    Ok((allocator, result.records_recovered))
}

/// Restore the free list of a cleanly closed file
fn load_free_list(file: &DepotFile, header: &Header) -> Result<Allocator> {
    let data_start = header.data_start();
    if header.freelist_offset == 0 {
        return Ok(Allocator::with_end(data_start, header.data_end));
    }

    let bytes = file.read_vec(header.freelist_offset, header.freelist_len as usize)?;
    let snapshot = FreeListSnapshot::from_bytes(&bytes)?;
    if snapshot.data_end != header.data_end {
        return Err(DepotError::corrupt(format!(
            "free list ends at {}, header says {}",
            snapshot.data_end, header.data_end
        )));
    }
    Allocator::from_snapshot(data_start, &snapshot)
}
