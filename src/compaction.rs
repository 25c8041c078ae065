//! Compaction Module
//!
//! Rewrites a depot into a fresh file with no free space.
//!
//! ## Responsibilities
//! - Explicit compaction (`Depot::compact`)
//! - Directory growth when the load factor is exceeded and no cursor is active
//!
//! ## Process
//! ```text
//! ┌───────────────┐  1. walk chains, bucket every live key under the new size
//! │  depot file   │──────────────────────────────┐
//! └───────────────┘                              ▼
//!                                      ┌───────────────────┐
//!                                      │ plan: offsets per │
//!                                      │ bucket, dense     │
//!                                      └─────────┬─────────┘
//!                  2. copy records in plan order │
//!                                                ▼
//! ┌───────────────┐  3. fsync + rename   ┌───────────────────┐
//! │  depot file   │◀─────────────────────│  <name>.rebuild   │
//! └───────────────┘                      └───────────────────┘
//! ```
//!
//! The replacement is locked before it is renamed into place, so no other
//! writer can slip in between. A crash before the rename leaves the original
//! untouched; the stray `.rebuild` file is overwritten by the next rebuild.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::config::MAX_BUCKETS;
use crate::depot::{Depot, DepotInner};
use crate::directory::{bucket_index, key_hash, read_record, ChainEntry, Directory, Link};
use crate::error::{DepotError, Result};
use crate::record::{self, RECORD_HEADER_SIZE};
use crate::storage::{align_up, Allocator, DepotFile, Header, WriteLock, HEADER_SIZE};

/// Records are copied through a buffer of about this size
const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Suffix of the temporary file a rebuild writes
const REBUILD_SUFFIX: &str = ".rebuild";

impl Depot {
    /// Rewrite the file densely, dropping all free space and tombstones
    ///
    /// The bucket count is kept unless the depot is over its load factor, in
    /// which case it is doubled until it is not. Fails with `CursorActive`
    /// while a cursor of this handle is still in use.
    pub fn compact(&mut self) -> Result<()> {
        let inner = self.writable()?;
        if inner.cursors.active() > 0 {
            return Err(DepotError::CursorActive);
        }

        let buckets = inner.grown_bucket_count();
        inner.rebuild(buckets)
    }
}

/// Where one live record goes in the rebuilt file
struct Placement {
    /// Location in the current file
    source: ChainEntry,
    /// Bucket under the new bucket count
    bucket: usize,
}

impl DepotInner {
    /// Grow the directory if the last insert pushed it over its load factor
    ///
    /// Skipped while any cursor of this handle is active; the next insert
    /// after they finish retries. The insert has already committed, so a
    /// failed rebuild only logs and leaves the current layout in place.
    pub(crate) fn grow_if_overloaded(&mut self) {
        let buckets = self.directory.bucket_count();
        let target = self.grown_bucket_count();
        if target == buckets {
            return;
        }
        if self.cursors.active() > 0 {
            debug!(
                buckets,
                cursors = self.cursors.active(),
                "directory growth deferred while cursors are active"
            );
            return;
        }
        if let Err(e) = self.rebuild(target) {
            warn!(buckets, error = %e, "directory growth failed, keeping current layout");
        }
    }

    /// Current bucket count doubled until the load factor holds
    fn grown_bucket_count(&self) -> u64 {
        let mut buckets = self.directory.bucket_count();
        while self.over_load_factor(buckets) && buckets * 2 <= MAX_BUCKETS {
            buckets *= 2;
        }
        buckets
    }

    /// Rewrite all live records into a new file with `bucket_count` buckets
    ///
    /// Bumps the generation, which invalidates every outstanding cursor. On
    /// error the handle still uses the original file unchanged.
    pub(crate) fn rebuild(&mut self, bucket_count: u64) -> Result<()> {
        let started = Instant::now();
        let old_size = self.file.len()?;
        let old_buckets = self.directory.bucket_count();

        let placements = self.plan(bucket_count)?;
        let final_path = self.file.path().to_path_buf();
        let tmp_path = rebuild_path(&final_path);

        let built = self.write_rebuilt(&tmp_path, &final_path, bucket_count, &placements);
        let (mut file, lock, directory, data_end) = match built {
            Ok(parts) => parts,
            Err(e) => {
                discard(&tmp_path);
                return Err(e);
            }
        };

        // Atomic swap: after this point the new layout is the depot
        if let Err(e) = fs::rename(&tmp_path, &final_path) {
            discard(&tmp_path);
            return Err(e.into());
        }
        sync_parent(&final_path);
        file.set_path(final_path);

        // Dropping the old lock and handle releases the replaced inode
        self.lock = Some(lock);
        self.file = file;
        self.directory = directory;
        self.allocator = Allocator::with_end(Header::data_start_for(bucket_count), data_end);
        self.generation += 1;

        if placements.len() as u64 != self.record_count {
            warn!(
                counted = self.record_count,
                found = placements.len(),
                "record count disagreed with the directory, using the rebuilt count"
            );
            self.record_count = placements.len() as u64;
        }

        info!(
            records = self.record_count,
            old_buckets,
            new_buckets = bucket_count,
            old_size,
            new_size = data_end,
            generation = self.generation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "depot rebuilt"
        );

        Ok(())
    }

    /// Pass 1: find every live record and its bucket under the new size
    ///
    /// Stable within a bucket, so chains keep their insertion order.
    fn plan(&self, bucket_count: u64) -> Result<Vec<Placement>> {
        let mut placements = Vec::with_capacity(self.record_count as usize);

        for bucket in 0..self.directory.bucket_count() as usize {
            for entry in self.directory.chain(&self.file, bucket)? {
                let entry = entry?;
                if !entry.header.live {
                    continue;
                }
                let key = self
                    .file
                    .read_vec(entry.offset + RECORD_HEADER_SIZE, entry.header.key_len as usize)?;
                placements.push(Placement {
                    source: entry,
                    bucket: bucket_index(key_hash(&key), bucket_count),
                });
            }
        }

        placements.sort_by_key(|p| p.bucket);
        Ok(placements)
    }

    /// Pass 2: write header, directory and records into `tmp_path`
    fn write_rebuilt(
        &self,
        tmp_path: &Path,
        final_path: &Path,
        bucket_count: u64,
        placements: &[Placement],
    ) -> Result<(DepotFile, WriteLock, Directory, u64)> {
        let file = DepotFile::create_new(tmp_path)?;
        let lock = WriteLock::acquire(file.as_file(), final_path)?;

        let data_start = Header::data_start_for(bucket_count);

        // Dense offsets, grouped by bucket
        let mut offsets = Vec::with_capacity(placements.len());
        let mut end = data_start;
        for placement in placements {
            offsets.push(end);
            end += align_up(placement.source.header.encoded_len());
        }

        let mut directory = Directory::create(&file, HEADER_SIZE, bucket_count)?;

        let mut buffer = BytesMut::with_capacity(COPY_BUFFER_SIZE);
        let mut buffer_start = data_start;
        for (i, placement) in placements.iter().enumerate() {
            let same_bucket_next = placements
                .get(i + 1)
                .filter(|p| p.bucket == placement.bucket)
                .map_or(0, |_| offsets[i + 1]);

            let first_in_bucket = i == 0 || placements[i - 1].bucket != placement.bucket;
            if first_in_bucket {
                directory.set_link(&file, Link::Bucket(placement.bucket), offsets[i])?;
            }

            let record = read_record(&self.file, &placement.source)?;
            let region = align_up(placement.source.header.encoded_len());
            let encoded = record::encode(
                &record.key,
                &record.value,
                placement.source.header.hash,
                same_bucket_next,
                region,
            )?;
            buffer.extend_from_slice(&encoded);
            buffer.resize(buffer.len() + (region - encoded.len() as u64) as usize, 0);

            if buffer.len() >= COPY_BUFFER_SIZE {
                file.write_at(&buffer, buffer_start)?;
                buffer_start += buffer.len() as u64;
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            file.write_at(&buffer, buffer_start)?;
        }

        let header = Header {
            bucket_count,
            record_count: placements.len() as u64,
            data_end: end,
            generation: self.generation + 1,
            freelist_offset: 0,
            freelist_len: 0,
            clean: false,
        };
        file.write_at(&header.encode(), 0)?;
        file.sync()?;

        debug!(
            path = %tmp_path.display(),
            records = placements.len(),
            data_end = end,
            "rebuild written"
        );

        Ok((file, lock, directory, end))
    }
}

/// `<file name>.rebuild` next to the depot
fn rebuild_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(REBUILD_SUFFIX);
    path.with_file_name(name)
}

fn discard(tmp_path: &Path) {
    if let Err(e) = fs::remove_file(tmp_path) {
        debug!(path = %tmp_path.display(), error = %e, "could not remove rebuild file");
    }
}

/// Make the rename durable (best effort; not every platform supports it)
fn sync_parent(path: &Path) {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if let Err(e) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
            debug!(path = %parent.display(), error = %e, "could not sync directory after rename");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
