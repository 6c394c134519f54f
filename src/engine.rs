//! Engine Module
//!
//! The storage engine that coordinates segments and the keydir.
//!
//! ## Responsibilities
//! - Rebuild the keydir from segments on startup
//! - Append puts/deletes and point the keydir at them
//! - Resolve reads through the keydir
//! - Serialize mutations issued through one handle

use std::path::Path;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::keydir::{Keydir, KeydirEntry};
use crate::record::{timestamp_now, Record};
use crate::segment::{self, SegmentId, SegmentRecovery, SegmentStore};

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Writes** (put/delete/compact): Serialized by `write_lock`
///   - Only ONE mutation at a time per handle
///   - Order: write_lock → append → (sync) → keydir → rollover check
///
/// - **Reads** (get/list_keys/fold): Not serialized against writes
///   - Copy the keydir pointer under a short read lock, then read the segment
///   - A read racing a write sees either the old or the new record
///
/// - **Across handles**: nothing is coordinated. One writer per directory is
///   an operating rule, and `merge` must be the only writer while it runs.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Segment files, active segment, read-handle cache
    pub(crate) store: SegmentStore,

    /// Key → latest record pointer
    pub(crate) keydir: Keydir,

    /// Serializes mutating operations
    pub(crate) write_lock: Mutex<()>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory if needed
    /// 2. Replay every segment into the keydir
    /// 3. In read-write mode, start a fresh active segment
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let store = SegmentStore::open(&config.data_dir, config.rollover_threshold)?;

        let (keydir, recovery) = SegmentRecovery::recover(&config.data_dir)?;

        if config.read_write {
            store.open_active()?;
        }

        tracing::info!(
            data_dir = %config.data_dir.display(),
            read_write = config.read_write,
            segments = recovery.segments_scanned,
            records = recovery.records_recovered,
            keys = keydir.live_count(),
            truncated_segments = recovery.truncated_segments.len(),
            "engine opened"
        );

        Ok(Self {
            config,
            store,
            keydir,
            write_lock: Mutex::new(()),
        })
    }

    /// Open read-write with default settings
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Open read-only: no segment is created and mutations fail
    pub fn open_read_only(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).read_write(false).build())
    }

    /// Get a value by key
    ///
    /// Returns `Ok(None)` for a key that was never written or was deleted.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.keydir.get(key) {
            Some(entry) if entry.is_live() => self.read_value(key, &entry).map(Some),
            _ => Ok(None),
        }
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_record(Record::put(key.to_vec(), value.to_vec(), timestamp_now()))
    }

    /// Delete a key
    ///
    /// Appends a tombstone; the key stays in the keydir marked deleted until
    /// a merge drops the segments holding it.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.write_record(Record::tombstone(key.to_vec(), timestamp_now()))
    }

    /// Every live key, in keydir iteration order (unsorted)
    pub fn list_keys(&self) -> Vec<Vec<u8>> {
        self.keydir.live_keys()
    }

    /// Fold over every live key/value pair
    ///
    /// Visits keys in the same order as `list_keys`, reading each value the
    /// way `get` does.
    pub fn fold<T, F>(&self, init: T, mut f: F) -> Result<T>
    where
        F: FnMut(T, &[u8], Vec<u8>) -> T,
    {
        let mut acc = init;
        for (key, entry) in self.keydir.live_entries() {
            let value = self.read_value(&key, &entry)?;
            acc = f(acc, &key, value);
        }
        Ok(acc)
    }

    /// Force the active segment to durable storage
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    /// Close the engine
    ///
    /// Flushes the active segment and releases every file handle.
    pub fn close(self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.store.close()
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Write path shared by put and delete
    fn write_record(&self, record: Record) -> Result<()> {
        self.ensure_writable()?;

        // Encode before locking: oversized keys/values fail without side effects
        let bytes = record.encode()?;

        let _write_guard = self.write_lock.lock();

        let (segment_id, offset) = self.store.append(&bytes)?;

        if self.config.sync_on_put {
            self.store.sync()?;
        }

        self.keydir.insert(
            record.key,
            KeydirEntry {
                segment_id,
                offset,
                record_len: bytes.len() as u64,
                timestamp: record.timestamp,
                tombstone: record.tombstone,
            },
        );

        self.store.maybe_rollover()?;

        Ok(())
    }

    /// Re-read the record behind `entry` and return its value
    pub(crate) fn read_value(&self, key: &[u8], entry: &KeydirEntry) -> Result<Vec<u8>> {
        let record = self.store.read_record(entry.segment_id, entry.offset)?;

        if record.key != key {
            return Err(CaskError::Corruption(format!(
                "segment {} offset {} holds a different key",
                entry.segment_id, entry.offset
            )));
        }
        if record.tombstone {
            return Err(CaskError::Corruption(format!(
                "segment {} offset {} is a tombstone but the keydir marks it live",
                entry.segment_id, entry.offset
            )));
        }

        Ok(record.value)
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.config.read_write {
            Ok(())
        } else {
            Err(CaskError::ReadOnly)
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether mutations are rejected
    pub fn is_read_only(&self) -> bool {
        !self.config.read_write
    }

    /// Id of the segment accepting appends (`None` when read-only)
    pub fn active_segment_id(&self) -> Option<SegmentId> {
        self.store.active_id()
    }

    /// Segment ids on disk, ascending
    pub fn segment_ids(&self) -> Result<Vec<SegmentId>> {
        self.store.segment_ids()
    }

    /// Number of segment files on disk
    pub fn segment_count(&self) -> Result<usize> {
        Ok(self.store.segment_ids()?.len())
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        self.keydir.live_count()
    }

    /// Whether `key` is live, without touching disk
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.keydir.get(key).is_some_and(|e| e.is_live())
    }

    /// Total bytes of all segment files
    pub fn disk_usage(&self) -> Result<u64> {
        segment::total_size(self.data_dir())
    }
}
