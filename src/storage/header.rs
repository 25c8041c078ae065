//! File Header
//!
//! Fixed 64-byte header at offset 0 of every depot file.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Magic "DEPOTKV\0" (8) | Version u16 (2) | Flags u16 (2)      │
//! │ Reserved u32 (4)                                             │
//! │ BucketCount u64 (8)   | RecordCount u64 (8)                  │
//! │ DataEnd u64 (8)       | Generation u64 (8)                   │
//! │ FreeListOffset u64 (8)| FreeListLen u32 (4) | CRC32 u32 (4)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use bytes::{Buf, BufMut};

use crate::error::{DepotError, Result};

/// Magic bytes identifying a depot file
pub const MAGIC: &[u8; 8] = b"DEPOTKV\0";

/// Current file format version
pub const VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: u64 = 64;

/// Width of one directory slot
pub const BUCKET_SLOT_SIZE: u64 = 8;

/// Set by a successful close, cleared while a writer has the file open
const FLAG_CLEAN: u16 = 0x0001;

/// Bytes covered by the header checksum
const CRC_RANGE: usize = 60;

/// Decoded file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Number of directory buckets
    pub bucket_count: u64,
    /// Live records at the time the header was written
    pub record_count: u64,
    /// End of the data region
    pub data_end: u64,
    /// Layout generation, bumped by every rebuild
    pub generation: u64,
    /// Offset of the free-list snapshot (0 = none)
    pub freelist_offset: u64,
    /// Length of the free-list snapshot
    pub freelist_len: u32,
    /// Whether the last writer closed the file cleanly
    pub clean: bool,
}

impl Header {
    /// Header for a freshly initialized, empty depot
    pub fn new(bucket_count: u64) -> Self {
        Self {
            bucket_count,
            record_count: 0,
            data_end: Self::data_start_for(bucket_count),
            generation: 0,
            freelist_offset: 0,
            freelist_len: 0,
            clean: true,
        }
    }

    /// Offset of the first directory slot
    pub fn directory_offset(&self) -> u64 {
        HEADER_SIZE
    }

    /// First byte of the data region
    pub fn data_start(&self) -> u64 {
        Self::data_start_for(self.bucket_count)
    }

    /// First byte of the data region for a given bucket count
    pub fn data_start_for(bucket_count: u64) -> u64 {
        HEADER_SIZE + bucket_count * BUCKET_SLOT_SIZE
    }

    /// Serialize to the fixed 64-byte layout
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut out = [0u8; HEADER_SIZE as usize];
        {
            let mut buf = &mut out[..];
            buf.put_slice(MAGIC);
            buf.put_u16_le(VERSION);
            buf.put_u16_le(if self.clean { FLAG_CLEAN } else { 0 });
            buf.put_u32_le(0);
            buf.put_u64_le(self.bucket_count);
            buf.put_u64_le(self.record_count);
            buf.put_u64_le(self.data_end);
            buf.put_u64_le(self.generation);
            buf.put_u64_le(self.freelist_offset);
            buf.put_u32_le(self.freelist_len);
        }
        let crc = crc32fast::hash(&out[..CRC_RANGE]);
        out[CRC_RANGE..].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Parse and validate a header
    ///
    /// `file_len` is the length of the file the header came from; a header
    /// whose directory would not fit in the file is rejected.
    pub fn decode(bytes: &[u8], file_len: u64) -> Result<Self> {
        if bytes.len() < HEADER_SIZE as usize {
            return Err(DepotError::corrupt(format!(
                "header truncated: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        if &bytes[0..8] != MAGIC {
            return Err(DepotError::corrupt(format!(
                "invalid magic: expected {:?}, got {:?}",
                MAGIC,
                &bytes[0..8]
            )));
        }

        let mut crc_bytes = &bytes[CRC_RANGE..HEADER_SIZE as usize];
        let stored_crc = crc_bytes.get_u32_le();
        let actual_crc = crc32fast::hash(&bytes[..CRC_RANGE]);
        if stored_crc != actual_crc {
            return Err(DepotError::corrupt(format!(
                "header checksum mismatch: stored {:08x}, computed {:08x}",
                stored_crc, actual_crc
            )));
        }

        let mut buf = &bytes[8..CRC_RANGE];
        let version = buf.get_u16_le();
        if version != VERSION {
            return Err(DepotError::corrupt(format!(
                "unsupported format version: {}",
                version
            )));
        }

        let flags = buf.get_u16_le();
        let _reserved = buf.get_u32_le();
        let header = Self {
            bucket_count: buf.get_u64_le(),
            record_count: buf.get_u64_le(),
            data_end: buf.get_u64_le(),
            generation: buf.get_u64_le(),
            freelist_offset: buf.get_u64_le(),
            freelist_len: buf.get_u32_le(),
            clean: flags & FLAG_CLEAN != 0,
        };

        header.validate(file_len)?;
        Ok(header)
    }

    /// Structural checks against the file length
    fn validate(&self, file_len: u64) -> Result<()> {
        if self.bucket_count == 0 {
            return Err(DepotError::corrupt("bucket count is zero"));
        }

        let data_start = self
            .bucket_count
            .checked_mul(BUCKET_SLOT_SIZE)
            .and_then(|dir| dir.checked_add(HEADER_SIZE))
            .ok_or_else(|| DepotError::corrupt("bucket count overflows the file layout"))?;

        if data_start > file_len {
            return Err(DepotError::corrupt(format!(
                "directory of {} buckets extends past end of file ({} bytes)",
                self.bucket_count, file_len
            )));
        }

        if self.data_end < data_start {
            return Err(DepotError::corrupt(format!(
                "data end {} precedes data start {}",
                self.data_end, data_start
            )));
        }

        // A dirty file may have grown past its recorded data end, never shrunk below it
        if self.clean && self.data_end > file_len {
            return Err(DepotError::corrupt(format!(
                "data end {} beyond end of file ({} bytes)",
                self.data_end, file_len
            )));
        }

        Ok(())
    }
}
