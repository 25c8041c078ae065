//! Tests for Cursor
//!
//! These tests verify:
//! - Full traversal yields every key exactly once
//! - Iterator adapters (keys, items, values)
//! - Mutation between cursor steps
//! - Directory growth deferred while a cursor is active
//! - Invalidation by foreign handles
//! - Compaction refused while a cursor is active

mod common;

use std::collections::HashSet;

use common::setup_temp_depot_with_config;
use depotkv::config::{Config, SyncStrategy};
use depotkv::{Depot, DepotError, OpenMode};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_depot_with(buckets: u64, load_factor: f64) -> (TempDir, Depot) {
    let config = Config::builder()
        .sync_strategy(SyncStrategy::OnClose)
        .initial_buckets(buckets)
        .max_load_factor(load_factor)
        .build();
    setup_temp_depot_with_config("cursor.depot", config)
}

fn fill(depot: &mut Depot, n: u32) -> HashSet<Vec<u8>> {
    (0..n)
        .map(|i| {
            let key = format!("key{}", i).into_bytes();
            depot.put(&key, format!("value{}", i).as_bytes()).unwrap();
            key
        })
        .collect()
}

// =============================================================================
// Traversal Tests
// =============================================================================

#[test]
fn test_cursor_empty_depot() {
    let (_temp, depot) = setup_temp_depot_with(16, 2.0);

    let mut cursor = depot.iterate().unwrap();

    assert_eq!(depot.next_key(&mut cursor).unwrap(), None);
    assert!(cursor.is_exhausted());
    // Stays exhausted
    assert_eq!(depot.next_key(&mut cursor).unwrap(), None);
}

#[test]
fn test_cursor_yields_every_key_once() {
    let (_temp, mut depot) = setup_temp_depot_with(16, 100.0);
    let expected = fill(&mut depot, 200);

    let mut seen = HashSet::new();
    let mut cursor = depot.iterate().unwrap();
    while let Some(key) = depot.next_key(&mut cursor).unwrap() {
        assert!(seen.insert(key), "key yielded twice");
    }

    assert_eq!(seen, expected);
}

#[test]
fn test_cursor_next_item_matches_get() {
    let (_temp, mut depot) = setup_temp_depot_with(8, 100.0);
    fill(&mut depot, 30);

    let mut cursor = depot.iterate().unwrap();
    let mut count = 0;
    while let Some((key, value)) = depot.next_item(&mut cursor).unwrap() {
        assert_eq!(depot.get(&key).unwrap(), value);
        count += 1;
    }

    assert_eq!(count, 30);
}

#[test]
fn test_cursor_next_value() {
    let (_temp, mut depot) = setup_temp_depot_with(8, 2.0);
    depot.put(b"only", b"value").unwrap();

    let mut cursor = depot.iterate().unwrap();

    assert_eq!(depot.next_value(&mut cursor).unwrap(), Some(b"value".to_vec()));
    assert_eq!(depot.next_value(&mut cursor).unwrap(), None);
}

#[test]
fn test_cursor_chain_order_is_insertion_order() {
    let (_temp, mut depot) = setup_temp_depot_with(1, 100.0);
    for key in [b"zebra".as_slice(), b"apple", b"mango"] {
        depot.put(key, b"x").unwrap();
    }

    let keys = depot.list_keys().unwrap();

    assert_eq!(keys, vec![b"zebra".to_vec(), b"apple".to_vec(), b"mango".to_vec()]);
}

#[test]
fn test_iterator_adapters() {
    let (_temp, mut depot) = setup_temp_depot_with(8, 100.0);
    depot.put(b"a", b"1").unwrap();
    depot.put(b"b", b"2").unwrap();

    let keys: HashSet<Vec<u8>> = depot.iterate_keys().unwrap().map(|k| k.unwrap()).collect();
    let values: HashSet<Vec<u8>> = depot.iterate_values().unwrap().map(|v| v.unwrap()).collect();
    let items: Vec<(Vec<u8>, Vec<u8>)> = depot.iterate_items().unwrap().collect::<Result<_, _>>().unwrap();

    assert_eq!(keys, HashSet::from([b"a".to_vec(), b"b".to_vec()]));
    assert_eq!(values, HashSet::from([b"1".to_vec(), b"2".to_vec()]));
    assert_eq!(items.len(), 2);
    for (key, value) in items {
        assert_eq!(depot.get(&key).unwrap(), value);
    }
}

// =============================================================================
// Mutation During Traversal Tests
// =============================================================================

#[test]
fn test_cursor_survives_overwrite_of_yielded_key() {
    let (_temp, mut depot) = setup_temp_depot_with(1, 100.0);
    depot.put(b"a", b"1").unwrap();
    depot.put(b"b", b"2").unwrap();
    depot.put(b"c", b"3").unwrap();

    let mut cursor = depot.iterate().unwrap();
    assert_eq!(depot.next_key(&mut cursor).unwrap(), Some(b"a".to_vec()));

    // Overwrite moves "a" to a new record; it must not be yielded again
    depot.put(b"a", b"changed").unwrap();

    let mut rest = Vec::new();
    while let Some(key) = depot.next_key(&mut cursor).unwrap() {
        rest.push(key);
    }
    assert_eq!(rest, vec![b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn test_cursor_skips_deleted_unvisited_key() {
    let (_temp, mut depot) = setup_temp_depot_with(1, 100.0);
    depot.put(b"a", b"1").unwrap();
    depot.put(b"b", b"2").unwrap();
    depot.put(b"c", b"3").unwrap();

    let mut cursor = depot.iterate().unwrap();
    assert_eq!(depot.next_key(&mut cursor).unwrap(), Some(b"a".to_vec()));

    depot.delete(b"b").unwrap();

    assert_eq!(depot.next_key(&mut cursor).unwrap(), Some(b"c".to_vec()));
    assert_eq!(depot.next_key(&mut cursor).unwrap(), None);
}

#[test]
fn test_cursor_delete_yielded_key_while_iterating() {
    let (_temp, mut depot) = setup_temp_depot_with(16, 100.0);
    let expected = fill(&mut depot, 100);

    let mut seen = HashSet::new();
    let mut cursor = depot.iterate().unwrap();
    while let Some(key) = depot.next_key(&mut cursor).unwrap() {
        depot.delete(&key).unwrap();
        assert!(seen.insert(key));
    }

    assert_eq!(seen, expected);
    assert_eq!(depot.count().unwrap(), 0);
}

// =============================================================================
// Invalidation Tests
// =============================================================================

#[test]
fn test_compact_refused_with_active_cursor() {
    let (_temp, mut depot) = setup_temp_depot_with(8, 100.0);
    fill(&mut depot, 5);

    let mut cursor = depot.iterate().unwrap();
    depot.next_key(&mut cursor).unwrap();

    assert!(matches!(depot.compact(), Err(DepotError::CursorActive)));
    assert_eq!(depot.stats().unwrap().active_cursors, 1);

    // Dropping the cursor unregisters it
    drop(cursor);
    depot.compact().unwrap();
}

#[test]
fn test_exhausted_cursor_does_not_block_compaction() {
    let (_temp, mut depot) = setup_temp_depot_with(8, 100.0);
    fill(&mut depot, 5);

    let mut cursor = depot.iterate().unwrap();
    while depot.next_key(&mut cursor).unwrap().is_some() {}

    depot.compact().unwrap();
    assert_eq!(depot.next_key(&mut cursor).unwrap(), None);
}

#[test]
fn test_growth_waits_for_active_cursor() {
    let (_temp, mut depot) = setup_temp_depot_with(1, 2.0);
    depot.put(b"a", b"1").unwrap();
    depot.put(b"b", b"2").unwrap();

    let mut cursor = depot.iterate().unwrap();
    let mut seen = HashSet::new();
    seen.insert(depot.next_key(&mut cursor).unwrap().unwrap());

    // Well past the load factor, but the directory may not change under the cursor
    for i in 0..10u32 {
        depot.put(format!("z{}", i).as_bytes(), b"v").unwrap();
    }
    assert_eq!(depot.bucket_count().unwrap(), 1);

    while let Some(key) = depot.next_key(&mut cursor).unwrap() {
        assert!(seen.insert(key), "key yielded twice");
    }
    assert!(seen.contains(&b"a".to_vec()));
    assert!(seen.contains(&b"b".to_vec()));

    // The cursor is exhausted, so the next insert grows the directory
    depot.put(b"after", b"v").unwrap();
    assert!(depot.bucket_count().unwrap() > 1);
    assert_eq!(depot.count().unwrap(), 13);
}

#[test]
fn test_dropped_cursor_lets_growth_resume() {
    let (_temp, mut depot) = setup_temp_depot_with(2, 1.0);
    depot.put(b"a", b"1").unwrap();

    let cursor = depot.iterate().unwrap();
    fill(&mut depot, 4);
    assert_eq!(depot.bucket_count().unwrap(), 2);

    drop(cursor);
    depot.put(b"b", b"2").unwrap();

    // Deferred growth catches up in one rebuild
    assert_eq!(depot.bucket_count().unwrap(), 8);
    assert!(depot.stats().unwrap().load_factor <= 1.0);
}

#[test]
fn test_cursor_from_other_handle_is_invalid() {
    let (temp, mut depot) = setup_temp_depot_with(8, 2.0);
    depot.put(b"a", b"1").unwrap();

    let reader = Depot::open(temp.path().join("cursor.depot"), OpenMode::ReadOnly).unwrap();
    let mut cursor = reader.iterate().unwrap();

    assert!(matches!(
        depot.next_key(&mut cursor),
        Err(DepotError::IteratorInvalidated)
    ));
}

#[test]
fn test_cursor_after_close() {
    let (_temp, mut depot) = setup_temp_depot_with(8, 2.0);
    depot.put(b"a", b"1").unwrap();
    let mut cursor = depot.iterate().unwrap();

    depot.close().unwrap();

    assert!(matches!(
        depot.next_key(&mut cursor),
        Err(DepotError::UseAfterClose)
    ));
}
