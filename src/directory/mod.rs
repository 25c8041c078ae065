//! Hash Directory Module
//!
//! Maps keys to bucket chains of record offsets.
//!
//! ## Layout
//! The directory is a flat array of `bucket_count` little-endian `u64` chain
//! heads directly after the file header. A head of 0 means an empty bucket.
//! Each record carries the offset of the next record in its chain, so a chain
//! is a singly linked list threaded through the data region, in insertion
//! order.
//!
//! ## Write-Through
//! Every change of a chain pointer is a single aligned 8-byte write, either
//! into a directory slot or into a record's `next` field. Writers keep the
//! heads cached in memory as well; readers always read heads from the file so
//! each lookup sees the writer's latest linked state.

mod hash;

pub use hash::{bucket_index, key_hash, short_hash};

use crate::error::{DepotError, Result};
use crate::record::{self, Record, RecordHeader, NEXT_FIELD_OFFSET, RECORD_HEADER_SIZE};
use crate::storage::{DepotFile, BUCKET_SLOT_SIZE};

/// A pointer slot that references a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Directory slot of a bucket
    Bucket(usize),
    /// `next` field of the record at this offset
    Record(u64),
}

/// One record visited while walking a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainEntry {
    /// Offset of the record
    pub offset: u64,
    /// Its decoded header
    pub header: RecordHeader,
}

/// Result of locating a key
#[derive(Debug, Clone, Copy)]
pub struct Lookup {
    /// Full key hash
    pub hash: u64,
    /// Bucket the key belongs to
    pub bucket: usize,
    /// Slot that points at the match, or the chain's tail slot when absent
    pub link: Link,
    /// The matching record, if any
    pub found: Option<ChainEntry>,
}

/// The hash directory of one open depot
#[derive(Debug)]
pub struct Directory {
    /// File offset of slot 0
    offset: u64,
    /// Cached chain heads
    heads: Vec<u64>,
    /// Read heads from the file instead of the cache
    live_reads: bool,
}

impl Directory {
    /// Write an empty directory of `bucket_count` slots at `offset`
    pub fn create(file: &DepotFile, offset: u64, bucket_count: u64) -> Result<Self> {
        let len = bucket_count
            .checked_mul(BUCKET_SLOT_SIZE)
            .ok_or_else(|| DepotError::Config(format!("{} buckets is too many", bucket_count)))?;

        // Zero in bounded chunks so huge directories don't need one huge buffer
        const CHUNK: u64 = 64 * 1024;
        let zeros = vec![0u8; CHUNK.min(len) as usize];
        let mut written = 0;
        while written < len {
            let n = (len - written).min(CHUNK);
            file.write_at(&zeros[..n as usize], offset + written)?;
            written += n;
        }

        Ok(Self {
            offset,
            heads: vec![0; bucket_count as usize],
            live_reads: false,
        })
    }

    /// Load the directory of an existing file
    ///
    /// `live_reads` makes lookups re-read heads from the file (reader handles).
    pub fn load(file: &DepotFile, offset: u64, bucket_count: u64, live_reads: bool) -> Result<Self> {
        let data_start = offset + bucket_count * BUCKET_SLOT_SIZE;
        let file_len = file.len()?;
        let raw = file.read_vec(offset, (bucket_count * BUCKET_SLOT_SIZE) as usize)?;

        let mut heads = Vec::with_capacity(bucket_count as usize);
        for (bucket, slot) in raw.chunks_exact(BUCKET_SLOT_SIZE as usize).enumerate() {
            let head = read_u64(slot);
            if head != 0 && (head < data_start || head >= file_len) {
                return Err(DepotError::corrupt(format!(
                    "bucket {} points outside the data region: {}",
                    bucket, head
                )));
            }
            heads.push(head);
        }

        Ok(Self {
            offset,
            heads,
            live_reads,
        })
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> u64 {
        self.heads.len() as u64
    }

    /// Bucket a hash falls into
    pub fn bucket_for(&self, hash: u64) -> usize {
        bucket_index(hash, self.bucket_count())
    }

    /// First byte after the directory
    pub fn data_start(&self) -> u64 {
        self.offset + self.bucket_count() * BUCKET_SLOT_SIZE
    }

    /// Head of a bucket chain (0 = empty)
    pub fn head(&self, file: &DepotFile, bucket: usize) -> Result<u64> {
        if !self.live_reads {
            return Ok(self.heads[bucket]);
        }
        let mut slot = [0u8; BUCKET_SLOT_SIZE as usize];
        file.read_at(&mut slot, self.slot_offset(bucket))?;
        Ok(read_u64(&slot))
    }

    /// Walk the chain of one bucket
    pub fn chain<'a>(&self, file: &'a DepotFile, bucket: usize) -> Result<Chain<'a>> {
        let head = self.head(file, bucket)?;
        Chain::new(file, head, self.data_start())
    }

    /// Locate `key`
    pub fn find(&self, file: &DepotFile, key: &[u8]) -> Result<Lookup> {
        let hash = key_hash(key);
        let short = short_hash(hash);
        let bucket = self.bucket_for(hash);

        let mut link = Link::Bucket(bucket);
        for entry in self.chain(file, bucket)? {
            let entry = entry?;
            let header = entry.header;

            if header.live && header.hash == short && header.key_len as usize == key.len() {
                let stored = file.read_vec(entry.offset + RECORD_HEADER_SIZE, key.len())?;
                if stored == key {
                    return Ok(Lookup {
                        hash,
                        bucket,
                        link,
                        found: Some(entry),
                    });
                }
            }
            link = Link::Record(entry.offset);
        }

        Ok(Lookup {
            hash,
            bucket,
            link,
            found: None,
        })
    }

    /// Point `link` at `target` (write-through)
    pub fn set_link(&mut self, file: &DepotFile, link: Link, target: u64) -> Result<()> {
        match link {
            Link::Bucket(bucket) => {
                file.write_at(&target.to_le_bytes(), self.slot_offset(bucket))?;
                self.heads[bucket] = target;
            }
            Link::Record(offset) => {
                file.write_at(&target.to_le_bytes(), offset + NEXT_FIELD_OFFSET)?;
            }
        }
        Ok(())
    }

    fn slot_offset(&self, bucket: usize) -> u64 {
        self.offset + bucket as u64 * BUCKET_SLOT_SIZE
    }
}

/// Iterator over the records of one chain
///
/// Bounded by the number of records the file could possibly hold, so a
/// corrupted cycle ends in an error instead of looping forever.
pub struct Chain<'a> {
    file: &'a DepotFile,
    next: u64,
    data_start: u64,
    file_len: u64,
    steps_left: u64,
    failed: bool,
}

impl<'a> Chain<'a> {
    fn new(file: &'a DepotFile, head: u64, data_start: u64) -> Result<Self> {
        let file_len = file.len()?;
        Ok(Self {
            file,
            next: head,
            data_start,
            file_len,
            steps_left: file_len / RECORD_HEADER_SIZE + 1,
            failed: false,
        })
    }

    fn step(&mut self) -> Result<ChainEntry> {
        let offset = self.next;

        if offset < self.data_start || offset + RECORD_HEADER_SIZE > self.file_len {
            return Err(DepotError::corrupt(format!(
                "chain pointer {} outside the data region",
                offset
            )));
        }

        if self.steps_left == 0 {
            return Err(DepotError::corrupt(format!(
                "chain cycle detected at offset {}",
                offset
            )));
        }
        self.steps_left -= 1;

        let mut raw = [0u8; RECORD_HEADER_SIZE as usize];
        self.file.read_at(&mut raw, offset)?;
        let header = record::decode_header(&raw)?;

        if offset + header.encoded_len() > self.file_len {
            return Err(DepotError::corrupt(format!(
                "record at {} claims {} bytes past end of file",
                offset,
                header.encoded_len()
            )));
        }

        self.next = header.next;
        Ok(ChainEntry { offset, header })
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = Result<ChainEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next == 0 {
            return None;
        }

        match self.step() {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Read the full record behind a chain entry
pub fn read_record(file: &DepotFile, entry: &ChainEntry) -> Result<Record> {
    let bytes = file.read_vec(entry.offset, entry.header.encoded_len() as usize)?;
    record::decode(&bytes)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}
