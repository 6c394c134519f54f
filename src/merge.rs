//! Merge Module
//!
//! Compaction: rewrite every live record into one fresh segment and delete
//! the segments it supersedes.
//!
//! ## Protocol
//! 1. Snapshot the live keydir entries
//! 2. Allocate merge segment id = max existing + 1
//! 3. Roll the active segment past the merge segment
//! 4. Re-read each live value, append it with its original timestamp
//! 5. Delete every other segment (best effort)
//! 6. Replay the remaining segments into a new keydir
//!
//! ## Operating rule
//! Merge must be the only writer on the directory while it runs. It knows
//! nothing about the keydir or active segment of any other open handle, and
//! a concurrent writer's records can be deleted out from under it.

use std::fs;
use std::path::Path;

use crate::engine::Engine;
use crate::error::{CaskError, Result};
use crate::keydir::KeydirEntry;
use crate::record::Record;
use crate::segment::{self, SegmentId, SegmentRecovery, SegmentWriter};

/// Outcome of a merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Live keys rewritten into the merge segment
    pub live_keys: u64,

    /// Id of the segment holding the merged records
    pub merge_segment_id: SegmentId,

    /// Superseded segments deleted
    pub segments_removed: u64,

    /// Superseded segments that could not be deleted (left orphaned)
    pub cleanup_failures: u64,

    /// Total segment bytes before the merge
    pub bytes_before: u64,

    /// Total segment bytes after the merge
    pub bytes_after: u64,
}

/// Merge the store in `dir` through its own short-lived handle
pub fn merge(dir: &Path) -> Result<MergeStats> {
    let engine = Engine::open_path(dir)?;
    let stats = engine.compact()?;
    engine.close()?;
    Ok(stats)
}

impl Engine {
    /// Compact the store behind this handle
    ///
    /// Holds the write lock for the whole mutation phase. The active segment
    /// is rolled past the merge segment before any merged record is written,
    /// so records written through this handle afterwards are always newer
    /// than the merged copies, whether or not the merge completes.
    pub fn compact(&self) -> Result<MergeStats> {
        self.ensure_writable()?;
        let _write_guard = self.write_lock.lock();

        let dir = self.store.dir().to_path_buf();
        let bytes_before = segment::total_size(&dir)?;

        let live = self.keydir.live_entries();
        let merge_id = segment::next_segment_id(&dir)?;

        let mut writer = SegmentWriter::open(&dir, merge_id)?;
        let active_id = match self.store.open_active() {
            Ok(id) => id,
            Err(e) => {
                drop(writer);
                discard_merge_segment(&dir, merge_id);
                return Err(e);
            }
        };

        if let Err(e) = self.write_merge_segment(&mut writer, &live) {
            drop(writer);
            discard_merge_segment(&dir, merge_id);
            return Err(e);
        }
        drop(writer);

        let superseded: Vec<SegmentId> = segment::list_segments(&dir)?
            .into_iter()
            .filter(|&id| id != merge_id && id != active_id)
            .collect();
        let (segments_removed, cleanup_failures) = self.store.remove_segments(&superseded);

        let (keydir, _) = SegmentRecovery::recover(&dir)?;
        self.keydir.replace(keydir);

        let stats = MergeStats {
            live_keys: live.len() as u64,
            merge_segment_id: merge_id,
            segments_removed,
            cleanup_failures,
            bytes_before,
            bytes_after: segment::total_size(&dir)?,
        };

        tracing::info!(
            live_keys = stats.live_keys,
            merge_segment = merge_id,
            segments_removed,
            cleanup_failures,
            bytes_before,
            bytes_after = stats.bytes_after,
            "merge complete"
        );

        Ok(stats)
    }

    /// Re-read every live value and append it with its original timestamp
    fn write_merge_segment(
        &self,
        writer: &mut SegmentWriter,
        live: &[(Vec<u8>, KeydirEntry)],
    ) -> Result<()> {
        for (key, entry) in live {
            let value = self.read_value(key, entry).map_err(|e| {
                CaskError::MergeAborted(format!(
                    "could not re-read live key from segment {}: {}",
                    entry.segment_id, e
                ))
            })?;

            let record = Record::put(key.clone(), value, entry.timestamp);
            writer.append(&record.encode()?)?;
        }
        writer.sync()
    }
}

/// Remove an unfinished merge segment
///
/// A leftover is harmless to recovery once the active segment has been
/// rolled past it, so a failed removal is only logged.
fn discard_merge_segment(dir: &Path, merge_id: SegmentId) {
    if let Err(e) = fs::remove_file(segment::segment_path(dir, merge_id)) {
        tracing::warn!(segment_id = merge_id, error = %e, "failed to remove unfinished merge segment");
    }
}
