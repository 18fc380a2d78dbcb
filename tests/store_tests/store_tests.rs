//! Tests for KeyValueStore
//!
//! These tests verify:
//! - Typed round trips and typed read errors
//! - Transactions (atomic batches, abandonment, staged order)
//! - Cache coherence under concurrent readers and writers
//! - Commit ordering across callers
//! - The write barrier and durability across reopen
//! - Key custody loss

use std::sync::Arc;
use std::thread;

use sealkv::config::{Config, SyncStrategy};
use sealkv::crypto::{DataKey, StaticKeyProvider};
use sealkv::{KeyValueStore, StoreError, Value, ValueType};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_key() -> StaticKeyProvider {
    StaticKeyProvider::new(DataKey::from_bytes([0x42; 32]))
}

fn test_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(temp_dir.path())
        .sync_strategy(SyncStrategy::EveryWrite)
        .build()
}

fn setup_temp_store() -> (TempDir, KeyValueStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = KeyValueStore::open(test_config(&temp_dir), &test_key()).unwrap();
    (temp_dir, store)
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_store_open_creates_directories() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("settings");

    let config = Config::builder().data_dir(&data_dir).build();
    let _store = KeyValueStore::open(config, &test_key()).unwrap();

    assert!(data_dir.exists());
    assert!(data_dir.join("wal.log").exists());
}

#[test]
fn test_round_trip_every_type() {
    let (_temp, store) = setup_temp_store();

    let mut tx = store.begin_write();
    tx.put("b", true)
        .put("i", -7i32)
        .put("l", 1_700_000_000_000i64)
        .put("f", 0.5f32)
        .put("s", "hello")
        .put("blob", vec![0u8, 1, 2, 255]);
    tx.commit_and_wait().unwrap();

    assert!(store.get::<bool>("b").unwrap());
    assert_eq!(store.get::<i32>("i").unwrap(), -7);
    assert_eq!(store.get::<i64>("l").unwrap(), 1_700_000_000_000);
    assert_eq!(store.get::<f32>("f").unwrap(), 0.5);
    assert_eq!(store.get::<String>("s").unwrap(), "hello");
    assert_eq!(store.get::<Vec<u8>>("blob").unwrap(), vec![0u8, 1, 2, 255]);
}

#[test]
fn test_get_missing_key() {
    let (_temp, store) = setup_temp_store();

    let err = store.get::<i32>("nope").unwrap_err();
    assert!(matches!(err, StoreError::KeyMissing(ref k) if k == "nope"));
    assert_eq!(store.get_value("nope").unwrap(), None);
    assert!(!store.contains_key("nope").unwrap());
}

#[test]
fn test_get_wrong_type_is_error() {
    let (_temp, store) = setup_temp_store();
    store.put("pin.counter", 3i32).wait().unwrap();

    match store.get::<i64>("pin.counter") {
        Err(StoreError::TypeMismatch {
            key,
            expected,
            found,
        }) => {
            assert_eq!(key, "pin.counter");
            assert_eq!(expected, ValueType::Long);
            assert_eq!(found, ValueType::Int);
        }
        other => panic!("expected TypeMismatch, got {:?}", other),
    }

    // The default only covers a missing key
    assert!(store.get_or::<bool>("pin.counter", false).is_err());
    assert!(store.get_or::<bool>("absent", true).unwrap());
}

#[test]
fn test_put_overwrite_and_remove() {
    let (_temp, store) = setup_temp_store();

    store.put("key", "value1").wait().unwrap();
    store.put("key", "value2").wait().unwrap();
    assert_eq!(store.get::<String>("key").unwrap(), "value2");

    store.remove("key").wait().unwrap();
    assert!(!store.contains_key("key").unwrap());

    // Removing an absent key is not an error
    store.remove("key").wait().unwrap();
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[test]
fn test_transaction_invisible_until_commit() {
    let (_temp, store) = setup_temp_store();

    let mut tx = store.begin_write();
    tx.put("staged", 1i32);
    assert_eq!(tx.len(), 1);
    assert!(!store.contains_key("staged").unwrap());

    tx.commit_and_wait().unwrap();
    assert_eq!(store.get::<i32>("staged").unwrap(), 1);
}

#[test]
fn test_abandoned_transaction_has_no_effect() {
    let (_temp, store) = setup_temp_store();

    {
        let mut tx = store.begin_write();
        tx.put("abandoned", true);
    }

    store.block_until_all_writes_finished().unwrap();
    store.reset_cache();
    assert!(!store.contains_key("abandoned").unwrap());
}

#[test]
fn test_operations_apply_in_staged_order() {
    let (_temp, store) = setup_temp_store();

    let mut tx = store.begin_write();
    tx.put("k", 1i32).remove("k").put("k", 2i32).put("gone", 0i32).remove("gone");
    tx.commit_and_wait().unwrap();

    assert_eq!(store.get::<i32>("k").unwrap(), 2);
    assert!(!store.contains_key("gone").unwrap());

    store.reset_cache();
    assert_eq!(store.get::<i32>("k").unwrap(), 2);
    assert!(!store.contains_key("gone").unwrap());
}

#[test]
fn test_empty_commit_succeeds() {
    let (_temp, store) = setup_temp_store();
    let tx = store.begin_write();
    assert!(tx.is_empty());
    tx.commit_and_wait().unwrap();
}

#[test]
fn test_get_after_handle_resolves_sees_write() {
    let (_temp, store) = setup_temp_store();

    // Load the cache first so the writer publishes into it
    assert!(!store.contains_key("k").unwrap());

    for i in 0..50i32 {
        store.put("k", i).wait().unwrap();
        assert_eq!(store.get::<i32>("k").unwrap(), i);
    }
}

// =============================================================================
// Barrier & Durability Tests
// =============================================================================

#[test]
fn test_pin_counter_scenario() {
    let (_temp, store) = setup_temp_store();

    let mut tx = store.begin_write();
    tx.put("pin.counter", 3i32);
    let _handle = tx.commit();

    store.block_until_all_writes_finished().unwrap();
    store.reset_cache();

    assert_eq!(store.get::<i32>("pin.counter").unwrap(), 3);
}

#[test]
fn test_barrier_drains_fire_and_forget_commits() {
    let (_temp, store) = setup_temp_store();

    for i in 0..200i32 {
        let _ = store.put(format!("key{}", i), i);
    }

    store.block_until_all_writes_finished().unwrap();
    assert_eq!(store.pending_writes(), 0);

    store.reset_cache();
    for i in 0..200i32 {
        assert_eq!(store.get::<i32>(&format!("key{}", i)).unwrap(), i);
    }
}

#[test]
fn test_barrier_then_reopen_is_durable() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .sync_strategy(SyncStrategy::EveryNBatches { count: 1000 })
        .build();

    {
        let store = KeyValueStore::open(config.clone(), &test_key()).unwrap();
        for i in 0..20i32 {
            let _ = store.put("registration.complete", i % 2 == 0);
            let _ = store.put(format!("hint.{}", i), i);
        }
        store.block_until_all_writes_finished().unwrap();
        // Simulate a crash: no close()
        std::mem::forget(store);
    }

    let store = KeyValueStore::open(config, &test_key()).unwrap();
    assert!(!store.get::<bool>("registration.complete").unwrap());
    for i in 0..20i32 {
        assert_eq!(store.get::<i32>(&format!("hint.{}", i)).unwrap(), i);
    }
}

#[test]
fn test_close_then_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);

    let store = KeyValueStore::open(config.clone(), &test_key()).unwrap();
    let _ = store.put("kbs.pin", "1234");
    let _ = store.remove("kbs.pin");
    let _ = store.put("kbs.master_key", vec![9u8; 32]);
    store.close().unwrap();

    let store = KeyValueStore::open(config, &test_key()).unwrap();
    assert!(!store.contains_key("kbs.pin").unwrap());
    assert_eq!(store.get::<Vec<u8>>("kbs.master_key").unwrap(), vec![9u8; 32]);
}

#[test]
fn test_reset_cache_returns_same_values() {
    let (_temp, store) = setup_temp_store();
    store.put("a", 1i64).wait().unwrap();
    store.put("b", "two").wait().unwrap();

    let before = store.snapshot().unwrap();
    store.reset_cache();
    let after = store.snapshot().unwrap();

    assert_eq!(*before, *after);
}

#[test]
fn test_compact_keeps_data() {
    let (temp, store) = setup_temp_store();
    store.put("a", 1i32).wait().unwrap();
    store.put("b", 2i32).wait().unwrap();

    store.compact().unwrap();
    assert!(temp.path().join("snapshot.db").exists());

    store.reset_cache();
    assert_eq!(store.get::<i32>("a").unwrap(), 1);
    assert_eq!(store.get::<i32>("b").unwrap(), 2);
}

// =============================================================================
// Key Custody Tests
// =============================================================================

#[test]
fn test_reopen_with_wrong_key_is_custody_loss() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);

    let store = KeyValueStore::open(config.clone(), &test_key()).unwrap();
    store.put("secret", "value").wait().unwrap();
    store.close().unwrap();

    let wrong = StaticKeyProvider::new(DataKey::from_bytes([0x13; 32]));
    let err = KeyValueStore::open(config, &wrong).err().unwrap();
    assert!(err.is_fatal(), "unexpected error: {}", err);
}

#[test]
fn test_wrong_key_on_compacted_store_is_custody_loss() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);

    let store = KeyValueStore::open(config.clone(), &test_key()).unwrap();
    store.put("secret", "value").wait().unwrap();
    store.compact().unwrap();
    store.close().unwrap();

    let wrong = StaticKeyProvider::new(DataKey::from_bytes([0x13; 32]));
    let err = KeyValueStore::open(config, &wrong).err().unwrap();
    assert!(matches!(err, StoreError::KeyCustodyLost(_)));
}

#[test]
fn test_values_are_encrypted_on_disk() {
    let (temp, store) = setup_temp_store();
    store.put("plain.marker", "VERY-RECOGNIZABLE-SECRET").wait().unwrap();
    store.compact().unwrap();
    store.put("after.compaction", "ANOTHER-RECOGNIZABLE-SECRET").wait().unwrap();
    store.close().unwrap();

    for name in ["wal.log", "snapshot.db"] {
        let raw = std::fs::read(temp.path().join(name)).unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(!text.contains("RECOGNIZABLE"), "{} leaks plaintext", name);
        assert!(!text.contains("plain.marker"), "{} leaks key names", name);
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_disjoint_keys() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);

    let mut handles = vec![];
    for t in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                let _ = store.put(format!("thread{}_key{}", t, i), format!("thread{}_value{}", t, i));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    store.block_until_all_writes_finished().unwrap();
    store.reset_cache();

    for t in 0..4 {
        for i in 0..50 {
            let key = format!("thread{}_key{}", t, i);
            let expected = format!("thread{}_value{}", t, i);
            assert_eq!(store.get::<String>(&key).unwrap(), expected);
        }
    }
}

#[test]
fn test_readers_never_see_partial_batch() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);

    let mut tx = store.begin_write();
    tx.put("left", 0i64).put("right", 0i64);
    tx.commit_and_wait().unwrap();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 1..=200i64 {
                let mut tx = store.begin_write();
                tx.put("left", i).put("right", i);
                let _ = tx.commit();
            }
            store.block_until_all_writes_finished().unwrap();
        })
    };

    let mut readers = vec![];
    for _ in 0..4 {
        let store = Arc::clone(&store);
        readers.push(thread::spawn(move || {
            for _ in 0..500 {
                let snapshot = store.snapshot().unwrap();
                assert_eq!(snapshot.get("left"), snapshot.get("right"));
            }
        }));
    }

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.get::<i64>("left").unwrap(), 200);
}

#[test]
fn test_commit_order_is_apply_order() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);

    // Warm the cache so every publish is observable
    assert!(!store.contains_key("seq").unwrap());

    let observer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut last = -1i32;
            for _ in 0..2000 {
                if let Some(Value::Int(seen)) = store.get_value("seq").unwrap() {
                    assert!(seen >= last, "went backwards: {} after {}", seen, last);
                    last = seen;
                }
            }
        })
    };

    for i in 0..300i32 {
        let _ = store.put("seq", i);
    }
    store.block_until_all_writes_finished().unwrap();
    observer.join().unwrap();

    assert_eq!(store.get::<i32>("seq").unwrap(), 299);
}
