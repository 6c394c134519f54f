//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/put/delete operations
//! - list_keys and fold over live keys
//! - Read-only mode
//! - Persistence across close/reopen
//! - Segment rollover
//! - Concurrent writers through one handle

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use std::thread;

use caskkv::config::Config;
use caskkv::engine::Engine;
use caskkv::record::{encode, HEADER_SIZE};
use caskkv::segment::segment_path;
use caskkv::CaskError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(temp_dir.path()).unwrap();
    (temp_dir, engine)
}

fn open_with_threshold(temp_dir: &TempDir, threshold: u64) -> Engine {
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .rollover_threshold(threshold)
        .build();
    Engine::open(config).unwrap()
}

fn sorted(mut keys: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
    keys.sort();
    keys
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_engine_open_creates_directory_and_active_segment() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let engine = Engine::open_path(&data_dir).unwrap();

    assert!(data_dir.is_dir());
    assert_eq!(engine.active_segment_id(), Some(1));
    assert!(segment_path(&data_dir, 1).exists());
}

#[test]
fn test_engine_reopen_starts_new_segment() {
    let temp_dir = TempDir::new().unwrap();

    let engine = Engine::open_path(temp_dir.path()).unwrap();
    engine.put(b"k", b"v").unwrap();
    engine.close().unwrap();

    let engine = Engine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.active_segment_id(), Some(2));
    assert_eq!(engine.segment_ids().unwrap(), vec![1, 2]);
}

#[test]
fn test_engine_rejects_zero_threshold() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .rollover_threshold(0)
        .build();

    assert!(matches!(Engine::open(config), Err(CaskError::Config(_))));
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.read_write);
    assert!(!config.sync_on_put);
    assert_eq!(config.rollover_threshold, 33_554_432);
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_put_get() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"hello", b"world").unwrap();

    assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
}

#[test]
fn test_engine_get_nonexistent_key() {
    let (_temp, engine) = setup_temp_engine();

    assert_eq!(engine.get(b"nonexistent").unwrap(), None);
}

#[test]
fn test_engine_put_overwrite() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value1").unwrap();
    engine.put(b"key", b"value2").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), Some(b"value2".to_vec()));
    assert_eq!(engine.key_count(), 1);
}

#[test]
fn test_engine_empty_key_and_value() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"", b"").unwrap();

    assert_eq!(engine.get(b"").unwrap(), Some(Vec::new()));
    assert_eq!(engine.list_keys(), vec![Vec::<u8>::new()]);
}

#[test]
fn test_engine_binary_keys_and_values() {
    let (_temp, engine) = setup_temp_engine();
    let key = [0u8, 255, 1, 254];
    let value: Vec<u8> = (0..=255u8).collect();

    engine.put(&key, &value).unwrap();

    assert_eq!(engine.get(&key).unwrap(), Some(value));
}

#[test]
fn test_engine_delete() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value").unwrap();
    engine.delete(b"key").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), None);
    assert!(!engine.contains_key(b"key"));
}

#[test]
fn test_engine_delete_keeps_superseded_record_on_disk() {
    let (temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value").unwrap();
    engine.delete(b"key").unwrap();

    let active = engine.active_segment_id().unwrap();
    let size = fs::metadata(segment_path(temp.path(), active)).unwrap().len();
    // put record (17 + 3 + 5) followed by tombstone (17 + 3)
    assert_eq!(size, (2 * HEADER_SIZE + 3 + 5 + 3) as u64);
}

#[test]
fn test_engine_delete_nonexistent_key() {
    let (_temp, engine) = setup_temp_engine();

    engine.delete(b"nonexistent").unwrap();

    assert_eq!(engine.get(b"nonexistent").unwrap(), None);
    assert!(engine.list_keys().is_empty());
}

#[test]
fn test_engine_put_after_delete() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"v1").unwrap();
    engine.delete(b"key").unwrap();
    engine.put(b"key", b"v2").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), Some(b"v2".to_vec()));
}

// =============================================================================
// list_keys / fold Tests
// =============================================================================

#[test]
fn test_engine_list_keys_excludes_deleted() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"a", b"1").unwrap();
    engine.put(b"b", b"2").unwrap();
    engine.put(b"c", b"3").unwrap();
    engine.delete(b"b").unwrap();

    assert_eq!(sorted(engine.list_keys()), vec![b"a".to_vec(), b"c".to_vec()]);
}

#[test]
fn test_engine_fold_collects_live_pairs() {
    let (_temp, engine) = setup_temp_engine();

    for i in 0..20 {
        engine
            .put(format!("k{}", i).as_bytes(), format!("v{}", i).as_bytes())
            .unwrap();
    }
    engine.delete(b"k3").unwrap();

    let pairs = engine
        .fold(HashMap::new(), |mut acc, key, value| {
            acc.insert(key.to_vec(), value);
            acc
        })
        .unwrap();

    assert_eq!(pairs.len(), 19);
    assert!(!pairs.contains_key(b"k3".as_slice()));
    assert_eq!(pairs[b"k7".as_slice()], b"v7".to_vec());
}

#[test]
fn test_engine_fold_follows_list_keys_order() {
    let (_temp, engine) = setup_temp_engine();
    for i in 0..50 {
        engine.put(format!("key{}", i).as_bytes(), b"x").unwrap();
    }

    let folded = engine
        .fold(Vec::new(), |mut acc, key, _| {
            acc.push(key.to_vec());
            acc
        })
        .unwrap();

    assert_eq!(folded, engine.list_keys());
}

#[test]
fn test_engine_fold_empty_returns_initial() {
    let (_temp, engine) = setup_temp_engine();

    let total = engine.fold(7usize, |acc, _, v| acc + v.len()).unwrap();

    assert_eq!(total, 7);
}

// =============================================================================
// Read-only Tests
// =============================================================================

#[test]
fn test_read_only_rejects_mutations() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open_path(temp_dir.path()).unwrap();
        engine.put(b"k", b"v").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open_read_only(temp_dir.path()).unwrap();

    assert!(engine.is_read_only());
    assert!(matches!(engine.put(b"k", b"v2"), Err(CaskError::ReadOnly)));
    assert!(matches!(engine.delete(b"k"), Err(CaskError::ReadOnly)));
    assert!(matches!(engine.compact(), Err(CaskError::ReadOnly)));
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
    engine.sync().unwrap();
}

#[test]
fn test_read_only_never_creates_segment() {
    let temp_dir = TempDir::new().unwrap();

    let engine = Engine::open_read_only(temp_dir.path()).unwrap();

    assert_eq!(engine.active_segment_id(), None);
    assert_eq!(engine.segment_count().unwrap(), 0);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_engine_open_tombstone_with_value_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let mut segment = encode(b"a", b"xyz", false, 0).unwrap().to_vec();
    segment[8] = 1;
    segment.extend_from_slice(&encode(b"b", b"2", false, 0).unwrap());
    fs::write(segment_path(temp_dir.path(), 1), &segment).unwrap();

    let engine = Engine::open_path(temp_dir.path()).unwrap();

    assert_eq!(engine.get(b"a").unwrap(), None);
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_engine_reopen_preserves_state() {
    let temp_dir = TempDir::new().unwrap();
    let mut expected = HashMap::new();

    {
        let engine = Engine::open_path(temp_dir.path()).unwrap();
        for i in 0..100u32 {
            let key = format!("key{}", i % 30).into_bytes();
            if i % 7 == 0 {
                engine.delete(&key).unwrap();
                expected.remove(&key);
            } else {
                let value = format!("value{}", i).into_bytes();
                engine.put(&key, &value).unwrap();
                expected.insert(key, value);
            }
        }
        engine.close().unwrap();
    }

    let engine = Engine::open_path(temp_dir.path()).unwrap();

    let mut expected_keys: Vec<Vec<u8>> = expected.keys().cloned().collect();
    expected_keys.sort();
    assert_eq!(sorted(engine.list_keys()), expected_keys);
    for (key, value) in &expected {
        assert_eq!(engine.get(key).unwrap().as_ref(), Some(value));
    }
}

#[test]
fn test_engine_reopen_read_only_sees_writes() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open_path(temp_dir.path()).unwrap();
        engine.put(b"a", b"1").unwrap();
        engine.delete(b"a").unwrap();
        engine.put(b"b", b"2").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open_read_only(temp_dir.path()).unwrap();

    assert_eq!(engine.get(b"a").unwrap(), None);
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_engine_sync_on_put() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .sync_on_put(true)
        .build();

    let engine = Engine::open(config).unwrap();
    engine.put(b"k", b"v").unwrap();
    engine.sync().unwrap();
    drop(engine);

    let engine = Engine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_engine_recovers_after_torn_append() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open_path(temp_dir.path()).unwrap();
        engine.put(b"a", b"1").unwrap();
        engine.put(b"b", b"2").unwrap();
        engine.close().unwrap();
    }

    // Simulate a crash halfway through a third append
    let mut file = OpenOptions::new()
        .append(true)
        .open(segment_path(temp_dir.path(), 1))
        .unwrap();
    file.write_all(&[0, 0, 0, 1, 0, 0, 0, 9, 0]).unwrap();
    drop(file);

    let engine = Engine::open_path(temp_dir.path()).unwrap();
    assert_eq!(sorted(engine.list_keys()), vec![b"a".to_vec(), b"b".to_vec()]);

    // New writes go to a fresh segment and are unaffected by the torn tail
    engine.put(b"c", b"3").unwrap();
    engine.close().unwrap();

    let engine = Engine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.get(b"c").unwrap(), Some(b"3".to_vec()));
    assert_eq!(engine.key_count(), 3);
}

// =============================================================================
// Rollover Tests
// =============================================================================

#[test]
fn test_engine_rollover_creates_segments() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_with_threshold(&temp_dir, 1024);

    let value = vec![7u8; 100];
    for i in 0..50 {
        engine.put(format!("key{}", i).as_bytes(), &value).unwrap();
    }

    let ids = engine.segment_ids().unwrap();
    assert!(ids.len() > 1);
    assert_eq!(engine.active_segment_id(), ids.last().copied());

    // Superseded segments stop growing once rolled over
    for id in &ids[..ids.len() - 1] {
        let size = fs::metadata(segment_path(temp_dir.path(), *id)).unwrap().len();
        assert!(size > 1024);
        assert!(size <= 1024 + (HEADER_SIZE + 5 + 100) as u64);
    }

    for i in 0..50 {
        assert_eq!(engine.get(format!("key{}", i).as_bytes()).unwrap(), Some(value.clone()));
    }
}

#[test]
fn test_engine_last_write_wins_across_rollover() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_with_threshold(&temp_dir, 256);

    engine.put(b"k", b"v1").unwrap();
    let first_segment = engine.active_segment_id().unwrap();
    for i in 0..20 {
        engine.put(format!("filler{}", i).as_bytes(), &[0u8; 64]).unwrap();
    }
    engine.put(b"k", b"v2").unwrap();

    assert!(engine.active_segment_id().unwrap() > first_segment);
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));

    engine.close().unwrap();
    let engine = Engine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_engine_concurrent_writers() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Arc::new(open_with_threshold(&temp_dir, 4096));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("t{}-k{}", t, i);
                    engine.put(key.as_bytes(), key.as_bytes()).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(engine.key_count(), 400);
    for t in 0..4 {
        for i in 0..100 {
            let key = format!("t{}-k{}", t, i);
            assert_eq!(engine.get(key.as_bytes()).unwrap(), Some(key.into_bytes()));
        }
    }
}

#[test]
fn test_engine_concurrent_readers_during_writes() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);
    engine.put(b"stable", b"value").unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..200 {
                engine.put(b"hot", format!("{}", i).as_bytes()).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..200 {
                    assert_eq!(engine.get(b"stable").unwrap(), Some(b"value".to_vec()));
                    let _ = engine.get(b"hot").unwrap();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }

    assert_eq!(engine.get(b"hot").unwrap(), Some(b"199".to_vec()));
}
