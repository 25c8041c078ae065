//! Record codec
//!
//! Encoding and decoding functions for records.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DepotError, Result};

use super::{
    Record, RecordHeader, LIVE_MARKER, MAX_RECORD_SIZE, RECORD_HEADER_SIZE, TOMBSTONE_MARKER,
};

/// Bytes needed for a record with the given key and value lengths
pub fn record_size(key_len: usize, val_len: usize) -> u64 {
    RECORD_HEADER_SIZE + key_len as u64 + val_len as u64
}

/// Encode a live record
///
/// `region` is the length of the space allocated for it and must be at least
/// [`record_size`]. Padding up to `region` is not written.
pub fn encode(key: &[u8], value: &[u8], hash: u32, next: u64, region: u64) -> Result<BytesMut> {
    let size = record_size(key.len(), value.len());
    if size > MAX_RECORD_SIZE {
        return Err(DepotError::RecordTooLarge { size });
    }
    if region < size || region > u32::MAX as u64 {
        return Err(DepotError::corrupt(format!(
            "region of {} bytes cannot hold a {} byte record",
            region, size
        )));
    }

    let region = region as u32;
    let key_len = key.len() as u32;
    let val_len = value.len() as u32;
    let crc = checksum(hash, region, key_len, val_len, key, value);

    let mut buf = BytesMut::with_capacity(size as usize);
    buf.put_u32_le(LIVE_MARKER);
    buf.put_u32_le(hash);
    buf.put_u64_le(next);
    buf.put_u32_le(region);
    buf.put_u32_le(key_len);
    buf.put_u32_le(val_len);
    buf.put_u32_le(crc);
    buf.put_slice(key);
    buf.put_slice(value);

    Ok(buf)
}

/// Decode the fixed header
///
/// Rejects unknown markers and any header whose declared lengths do not fit
/// inside its own region.
pub fn decode_header(bytes: &[u8]) -> Result<RecordHeader> {
    if bytes.len() < RECORD_HEADER_SIZE as usize {
        return Err(DepotError::corrupt(format!(
            "record header truncated: expected {} bytes, got {}",
            RECORD_HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut buf = &bytes[..RECORD_HEADER_SIZE as usize];
    let marker = buf.get_u32_le();
    let live = match marker {
        LIVE_MARKER => true,
        TOMBSTONE_MARKER => false,
        other => {
            return Err(DepotError::corrupt(format!(
                "unknown record marker: 0x{:08x}",
                other
            )))
        }
    };

    let header = RecordHeader {
        live,
        hash: buf.get_u32_le(),
        next: buf.get_u64_le(),
        region: buf.get_u32_le(),
        key_len: buf.get_u32_le(),
        val_len: buf.get_u32_le(),
        crc: buf.get_u32_le(),
    };

    if header.encoded_len() > header.region as u64 {
        return Err(DepotError::corrupt(format!(
            "record lengths (key {}, value {}) exceed region of {} bytes",
            header.key_len, header.val_len, header.region
        )));
    }

    Ok(header)
}

/// Decode a whole record and verify its checksum
///
/// `bytes` must hold at least the header, key and value.
pub fn decode(bytes: &[u8]) -> Result<Record> {
    let header = decode_header(bytes)?;

    let total = header.encoded_len() as usize;
    if bytes.len() < total {
        return Err(DepotError::corrupt(format!(
            "record body truncated: expected {} bytes, got {}",
            total,
            bytes.len()
        )));
    }

    let key_start = RECORD_HEADER_SIZE as usize;
    let val_start = key_start + header.key_len as usize;
    let key = &bytes[key_start..val_start];
    let value = &bytes[val_start..total];

    let crc = checksum(
        header.hash,
        header.region,
        header.key_len,
        header.val_len,
        key,
        value,
    );
    if crc != header.crc {
        return Err(DepotError::corrupt(format!(
            "record checksum mismatch: stored {:08x}, computed {:08x}",
            header.crc, crc
        )));
    }

    Ok(Record {
        header,
        key: key.to_vec(),
        value: value.to_vec(),
    })
}

/// CRC over the immutable part of a record
fn checksum(hash: u32, region: u32, key_len: u32, val_len: u32, key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&hash.to_le_bytes());
    hasher.update(&region.to_le_bytes());
    hasher.update(&key_len.to_le_bytes());
    hasher.update(&val_len.to_le_bytes());
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}
