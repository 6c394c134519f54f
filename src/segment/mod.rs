//! Segment Module
//!
//! Append-only segment files and their lifecycle.
//!
//! ## Responsibilities
//! - Enumerate segments in ascending id order
//! - Own the single active (appendable) segment and roll it over by size
//! - Cache read handles per segment for the store's lifetime
//! - Replay segments into a keydir at startup
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//!   ├── 00000001.data   (read-only, superseded)
//!   ├── 00000002.data   (read-only, superseded)
//!   └── 00000003.data   (active)
//! ```
//!
//! Segments are never modified in place. They are superseded by rollover and
//! deleted only by merge.

mod recovery;
mod store;
mod writer;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use recovery::{RecoveryResult, SegmentRecovery};
pub use store::SegmentStore;
pub use writer::SegmentWriter;

/// Strictly increasing segment identifier
pub type SegmentId = u64;

/// File extension of segment files
pub const SEGMENT_EXTENSION: &str = "data";

/// Generate the file path for a segment: "{dir}/00000042.data"
pub fn segment_path(dir: &Path, id: SegmentId) -> PathBuf {
    dir.join(format!("{:08}.{}", id, SEGMENT_EXTENSION))
}

/// Parse a segment id from a filename
/// "00000042.data" → Some(42)
pub fn parse_segment_id(path: &Path) -> Option<SegmentId> {
    if path.extension()? != SEGMENT_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// All segment ids in `dir`, ascending. Other files are ignored.
pub fn list_segments(dir: &Path) -> Result<Vec<SegmentId>> {
    let mut ids = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(id) = parse_segment_id(&path) {
            ids.push(id);
        }
    }

    ids.sort_unstable();
    Ok(ids)
}

/// Next id to allocate: max existing + 1, or 1 for an empty directory
pub fn next_segment_id(dir: &Path) -> Result<SegmentId> {
    Ok(list_segments(dir)?.last().map(|&id| id + 1).unwrap_or(1))
}

/// Sum of all segment file sizes in `dir`
pub fn total_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for id in list_segments(dir)? {
        total += fs::metadata(segment_path(dir, id))?.len();
    }
    Ok(total)
}
