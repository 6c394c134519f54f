//! Keydir implementation
//!
//! HashMap-based index with RwLock for concurrency.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::KeydirEntry;

/// In-memory key → record pointer index
///
/// Iteration order is the HashMap's order: unordered, but stable for an
/// unchanged map, so `live_keys` and `live_entries` agree with each other.
#[derive(Debug, Default)]
pub struct Keydir {
    entries: RwLock<HashMap<Vec<u8>, KeydirEntry>>,
}

impl Keydir {
    /// Create a new empty Keydir
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `key` at a new record, replacing any previous pointer
    pub fn insert(&self, key: Vec<u8>, entry: KeydirEntry) {
        self.entries.write().insert(key, entry);
    }

    /// Copy of the pointer for `key`, tombstoned or not
    pub fn get(&self, key: &[u8]) -> Option<KeydirEntry> {
        self.entries.read().get(key).copied()
    }

    /// Keys whose latest record is not a tombstone
    pub fn live_keys(&self) -> Vec<Vec<u8>> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Snapshot of every live key with its pointer
    pub fn live_entries(&self) -> Vec<(Vec<u8>, KeydirEntry)> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(key, entry)| (key.clone(), *entry))
            .collect()
    }

    /// Number of keys in the index, tombstones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of keys visible to readers
    pub fn live_count(&self) -> usize {
        self.entries.read().values().filter(|e| e.is_live()).count()
    }

    /// Swap in a freshly rebuilt index (after merge)
    pub fn replace(&self, other: Keydir) {
        *self.entries.write() = other.entries.into_inner();
    }
}
