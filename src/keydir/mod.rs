//! Keydir Module
//!
//! In-memory index mapping every key to its most recent record on disk.
//!
//! ## Responsibilities
//! - O(1) pointer lookup for reads
//! - Updated by every put/delete, rebuilt from scratch by recovery
//! - Tombstoned keys stay in the index until a merge drops their segment
//!
//! ## Ordering
//! "Most recent" is log position (segment id, then offset). The timestamp
//! stored alongside is diagnostic and is never compared.

mod table;

pub use table::Keydir;

use crate::segment::SegmentId;

/// Pointer to the latest record for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeydirEntry {
    /// Segment holding the record
    pub segment_id: SegmentId,

    /// Byte offset of the record header within the segment
    pub offset: u64,

    /// Full record length (header + key + value)
    pub record_len: u64,

    /// Diagnostic timestamp copied from the record header
    pub timestamp: u64,

    /// Whether the record is a deletion marker
    pub tombstone: bool,
}

impl KeydirEntry {
    /// Whether this entry makes the key visible to readers
    pub fn is_live(&self) -> bool {
        !self.tombstone
    }
}
