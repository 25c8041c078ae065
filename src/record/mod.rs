//! Record Module
//!
//! On-disk encoding of a single key/value record.
//!
//! ## Record Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (32 bytes)                                            │
//! │ ┌──────────┬──────────┬──────────┬──────────┐                │
//! │ │Marker (4)│ Hash (4) │ Next (8) │Region (4)│                │
//! │ └──────────┴──────────┴──────────┴──────────┘                │
//! │ ┌──────────┬──────────┬──────────┐                           │
//! │ │KeyLen (4)│ValLen (4)│ CRC (4)  │                           │
//! │ └──────────┴──────────┴──────────┘                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Key bytes | Value bytes | padding up to Region               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Marker: `LIVE` or `DEAD` (tombstone). Deleting a record rewrites only
//!   these four bytes.
//! - Next: offset of the next record in the same bucket chain, 0 = end.
//!   The only other field that is ever rewritten in place.
//! - CRC covers hash, region, lengths, key and value; never the two mutable
//!   fields.

mod codec;

pub use codec::{decode, decode_header, encode, record_size};

/// Size of the fixed record header
pub const RECORD_HEADER_SIZE: u64 = 32;

/// Records start on multiples of this
pub const RECORD_ALIGN: u64 = 8;

/// Marker of a live record
pub const LIVE_MARKER: u32 = u32::from_le_bytes(*b"LIVE");

/// Marker of a deleted record awaiting reuse
pub const TOMBSTONE_MARKER: u32 = u32::from_le_bytes(*b"DEAD");

/// Byte offset of the marker within a record
pub const MARKER_FIELD_OFFSET: u64 = 0;

/// Byte offset of the chain pointer within a record
pub const NEXT_FIELD_OFFSET: u64 = 8;

/// Largest encodable record (header + key + value)
pub const MAX_RECORD_SIZE: u64 = u32::MAX as u64 - 2 * (RECORD_HEADER_SIZE + RECORD_ALIGN);

/// Decoded fixed-size record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// False for tombstones
    pub live: bool,
    /// Low 32 bits of the key hash
    pub hash: u32,
    /// Next record in the chain (0 = none)
    pub next: u64,
    /// Allocated region length, header included
    pub region: u32,
    /// Key length in bytes
    pub key_len: u32,
    /// Value length in bytes
    pub val_len: u32,
    /// Checksum of the immutable part
    pub crc: u32,
}

impl RecordHeader {
    /// Header plus key plus value
    pub fn encoded_len(&self) -> u64 {
        RECORD_HEADER_SIZE + self.key_len as u64 + self.val_len as u64
    }
}

/// A fully decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub header: RecordHeader,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}
