//! Tests for the Block Allocator
//!
//! These tests verify:
//! - Appending at the end of the data region
//! - Best-fit reuse, splitting and absorbing remainders
//! - Coalescing of adjacent free ranges
//! - Growing a trailing free range in place
//! - Rejection of double and out-of-bounds frees
//! - Snapshot restore and rebuild from used regions

use depotkv::storage::{align_up, Allocation, Allocator, FreeListSnapshot, MIN_FREE_RANGE};
use depotkv::DepotError;

const START: u64 = 1000;

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_allocate_appends_aligned() {
    let mut allocator = Allocator::new(START);

    let a = allocator.allocate(33);
    let b = allocator.allocate(40);

    assert_eq!(a, Allocation { offset: START, len: 40 });
    assert_eq!(b, Allocation { offset: START + 40, len: 40 });
    assert_eq!(allocator.end(), START + 80);
    assert_eq!(allocator.used_bytes(), 80);
}

#[test]
fn test_align_up() {
    assert_eq!(align_up(0), 0);
    assert_eq!(align_up(1), 8);
    assert_eq!(align_up(8), 8);
    assert_eq!(align_up(33), 40);
}

#[test]
fn test_best_fit_picks_smallest_range() {
    let mut allocator = Allocator::new(START);
    let big = allocator.allocate(400);
    let _keep1 = allocator.allocate(40);
    let small = allocator.allocate(96);
    let _keep2 = allocator.allocate(40);

    allocator.free(big.offset, big.len).unwrap();
    allocator.free(small.offset, small.len).unwrap();

    let got = allocator.allocate(90);
    assert_eq!(got.offset, small.offset);
}

#[test]
fn test_remainder_is_split_off() {
    let mut allocator = Allocator::new(START);
    let a = allocator.allocate(400);
    let _tail = allocator.allocate(40);
    allocator.free(a.offset, a.len).unwrap();

    let got = allocator.allocate(100);

    assert_eq!(got, Allocation { offset: START, len: 104 });
    assert_eq!(allocator.free_ranges(), 1);
    assert_eq!(allocator.free_bytes(), 400 - 104);
    assert_eq!(allocator.allocate(400 - 104).offset, START + 104);
}

#[test]
fn test_small_remainder_is_absorbed() {
    let mut allocator = Allocator::new(START);
    let a = allocator.allocate(80);
    let _tail = allocator.allocate(40);
    allocator.free(a.offset, a.len).unwrap();

    // 80 - 48 = 32 is less than a minimal record
    assert!(80 - 48 < MIN_FREE_RANGE);
    let got = allocator.allocate(48);

    assert_eq!(got, Allocation { offset: START, len: 80 });
    assert_eq!(allocator.free_bytes(), 0);
}

#[test]
fn test_trailing_free_range_grows_in_place() {
    let mut allocator = Allocator::new(START);
    let _keep = allocator.allocate(40);
    let tail = allocator.allocate(40);
    allocator.free(tail.offset, tail.len).unwrap();

    let got = allocator.allocate(200);

    assert_eq!(got, Allocation { offset: tail.offset, len: 200 });
    assert_eq!(allocator.end(), tail.offset + 200);
    assert_eq!(allocator.free_ranges(), 0);
}

// =============================================================================
// Free Tests
// =============================================================================

#[test]
fn test_free_coalesces_neighbours() {
    let mut allocator = Allocator::new(START);
    let a = allocator.allocate(40);
    let b = allocator.allocate(40);
    let c = allocator.allocate(40);
    let _d = allocator.allocate(40);

    allocator.free(a.offset, a.len).unwrap();
    allocator.free(c.offset, c.len).unwrap();
    assert_eq!(allocator.free_ranges(), 2);

    allocator.free(b.offset, b.len).unwrap();

    assert_eq!(allocator.free_ranges(), 1);
    assert_eq!(allocator.free_bytes(), 120);
    assert_eq!(allocator.allocate(120).offset, START);
}

#[test]
fn test_double_free_rejected() {
    let mut allocator = Allocator::new(START);
    let a = allocator.allocate(40);
    let _b = allocator.allocate(40);
    allocator.free(a.offset, a.len).unwrap();

    let result = allocator.free(a.offset, a.len);

    assert!(matches!(result, Err(DepotError::Corrupt(_))));
}

#[test]
fn test_overlapping_free_rejected() {
    let mut allocator = Allocator::new(START);
    let a = allocator.allocate(80);
    let _b = allocator.allocate(40);
    allocator.free(a.offset, a.len).unwrap();

    assert!(matches!(allocator.free(START + 40, 40), Err(DepotError::Corrupt(_))));
}

#[test]
fn test_out_of_bounds_free_rejected() {
    let mut allocator = Allocator::new(START);
    allocator.allocate(40);

    assert!(matches!(allocator.free(START - 8, 8), Err(DepotError::Corrupt(_))));
    assert!(matches!(allocator.free(START + 40, 8), Err(DepotError::Corrupt(_))));
}

#[test]
fn test_trim_tail() {
    let mut allocator = Allocator::new(START);
    let _a = allocator.allocate(40);
    let b = allocator.allocate(40);
    let c = allocator.allocate(40);
    allocator.free(b.offset, b.len).unwrap();
    allocator.free(c.offset, c.len).unwrap();

    let end = allocator.trim_tail();

    assert_eq!(end, START + 40);
    assert_eq!(allocator.free_bytes(), 0);
    assert_eq!(allocator.fragmentation(), 0.0);
}

// =============================================================================
// Restore Tests
// =============================================================================

#[test]
fn test_snapshot_restore() {
    let mut allocator = Allocator::new(START);
    let a = allocator.allocate(40);
    let _b = allocator.allocate(40);
    let c = allocator.allocate(80);
    let _d = allocator.allocate(40);
    allocator.free(a.offset, a.len).unwrap();
    allocator.free(c.offset, c.len).unwrap();

    let bytes = allocator.snapshot().to_bytes().unwrap();
    let snapshot = FreeListSnapshot::from_bytes(&bytes).unwrap();
    let restored = Allocator::from_snapshot(START, &snapshot).unwrap();

    assert_eq!(restored.end(), allocator.end());
    assert_eq!(restored.free_bytes(), 120);
    assert_eq!(restored.free_ranges(), 2);
}

#[test]
fn test_snapshot_out_of_bounds_rejected() {
    let snapshot = FreeListSnapshot {
        data_end: START + 100,
        ranges: vec![(START + 80, 40)],
    };

    assert!(matches!(
        Allocator::from_snapshot(START, &snapshot),
        Err(DepotError::Corrupt(_))
    ));
}

#[test]
fn test_snapshot_unsorted_rejected() {
    let snapshot = FreeListSnapshot {
        data_end: START + 200,
        ranges: vec![(START + 80, 40), (START, 40)],
    };

    assert!(Allocator::from_snapshot(START, &snapshot).is_err());
}

#[test]
fn test_from_used_derives_gaps() {
    let used = vec![(START + 80, 40), (START, 40)];

    let mut allocator = Allocator::from_used(START, used).unwrap();

    assert_eq!(allocator.end(), START + 120);
    assert_eq!(allocator.free_bytes(), 40);
    assert_eq!(allocator.used_bytes(), 80);
    assert_eq!(allocator.allocate(40).offset, START + 40);
}

#[test]
fn test_from_used_rejects_overlap() {
    let used = vec![(START, 80), (START + 40, 40)];

    assert!(matches!(
        Allocator::from_used(START, used),
        Err(DepotError::Corrupt(_))
    ));
}
