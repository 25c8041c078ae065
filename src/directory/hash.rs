//! Key hashing
//!
//! Bucket placement is persisted, so the hash must be identical across
//! processes, builds and platforms. xxh3 with a fixed (default) seed is.

use xxhash_rust::xxh3::xxh3_64;

/// 64-bit hash of the raw key bytes
pub fn key_hash(key: &[u8]) -> u64 {
    xxh3_64(key)
}

/// The part of the hash stored in each record header
pub fn short_hash(hash: u64) -> u32 {
    hash as u32
}

/// Bucket index for a hash under a given bucket count
pub fn bucket_index(hash: u64, bucket_count: u64) -> usize {
    (hash % bucket_count) as usize
}
