// SharedTable integration tests.
//
// Callbacks and traversals over a shared handle may call back into the
// same table. Reads and value replacement are fine; adding or removing
// keys while they run surfaces as ConcurrentStructuralChange.
use chained_table::{SharedTable, TableConfig, TableError};
use std::collections::BTreeMap;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn for_each_with_new_key_is_rejected() {
    init_tracing();
    let t = SharedTable::new();
    for k in 0..10 {
        t.put(k, k);
    }
    let handle = t.clone();
    let mut calls = 0;
    let r = t.for_each(|k, _| {
        calls += 1;
        handle.put(k + 1_000, 0);
    });
    assert_eq!(r, Err(TableError::ConcurrentStructuralChange));
    assert_eq!(calls, 1, "fails on the step after the first change");
}

#[test]
fn views_track_the_table() {
    let t: SharedTable<String, u32> = SharedTable::new();
    let keys = t.keys();
    let values = t.values();
    let entries = t.entries();
    assert!(keys.is_empty() && values.is_empty() && entries.is_empty());

    t.put("a".to_string(), 1);
    t.put("b".to_string(), 2);
    assert!(keys.contains("a"));
    assert!(values.contains(&2));
    assert!(entries.contains(&"b".to_string(), &2));

    assert!(keys.remove("a"));
    assert_eq!(t.len(), 1);
    assert_eq!(values.len(), 1);
    entries.clear();
    assert!(t.is_empty());
}

#[test]
fn view_traversal_fails_after_outside_insert() {
    let t = SharedTable::new();
    t.put(1, 'a');
    t.put(2, 'b');
    let values = t.values();
    let mut it = values.iter();
    assert!(it.next().unwrap().is_ok());
    t.put(3, 'c');
    assert_eq!(it.next(), Some(Err(TableError::ConcurrentStructuralChange)));
}

/// Invariant: growth during a callback counts as a structural change.
#[test]
fn rehash_inside_compute_is_detected() {
    init_tracing();
    let cfg = TableConfig::new().with_capacity(3);
    let t = SharedTable::with_config(cfg).unwrap();
    t.put(0, 0);
    let handle = t.clone();
    let r = t.compute(1, |_, _| {
        for k in 10..20 {
            handle.put(k, k);
        }
        Some(1)
    });
    assert_eq!(r, Err(TableError::ConcurrentStructuralChange));
    assert!(t.capacity() > 3);
    assert!(!t.contains_key(&1));
}

#[test]
fn compute_if_absent_may_read_the_table() {
    let t = SharedTable::new();
    t.put("base", 10);
    let handle = t.clone();
    let v = t.compute_if_absent("derived", |_| handle.get("base").map(|b| b * 2));
    assert_eq!(v, Ok(Some(20)));
    assert_eq!(t.get("derived"), Some(20));
    // Present keys never run the callback.
    let v = t.compute_if_absent("derived", |_| unreachable!());
    assert_eq!(v, Ok(Some(20)));
}

#[test]
fn replace_all_may_replace_through_another_handle() {
    let t = SharedTable::new();
    for k in 1..=4 {
        t.put(k, k);
    }
    let handle = t.clone();
    t.replace_all(|k, v| {
        handle.replace(k, 0);
        v * 100
    })
    .unwrap();
    let snapshot: BTreeMap<i32, i32> = t.iter().map(|e| e.unwrap()).collect();
    assert_eq!(snapshot, (1..=4).map(|k| (k, k * 100)).collect());
}

#[test]
fn enumerations_walk_without_removal() {
    let t = SharedTable::new();
    for k in 0..6 {
        t.put(k, k * k);
    }
    let keys: Result<Vec<i32>, _> = t.key_enumeration().collect();
    let mut keys = keys.unwrap();
    keys.sort();
    assert_eq!(keys, vec![0, 1, 2, 3, 4, 5]);
    let total: i32 = t.elements().map(|v| v.unwrap()).sum();
    assert_eq!(total, 55);
}

#[test]
fn shared_and_std_maps_compare_equal() {
    let t = SharedTable::new();
    let mut m = BTreeMap::new();
    for k in 0..20u64 {
        t.put(k, k ^ 0x55);
        m.insert(k, k ^ 0x55);
    }
    assert!(t == m);
    m.remove(&0);
    assert!(t != m);
}
