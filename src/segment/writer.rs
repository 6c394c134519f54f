//! Segment Writer
//!
//! Appends encoded records to one segment file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::{segment_path, SegmentId};

/// Append handle for a single segment
///
/// Records are written with one `write_all` each and no user-space buffer,
/// so a record is visible to read handles as soon as `append` returns.
#[derive(Debug)]
pub struct SegmentWriter {
    id: SegmentId,
    path: PathBuf,
    file: File,
    /// Current end of file = offset of the next record
    size: u64,
}

impl SegmentWriter {
    /// Open (creating if needed) segment `id` in `dir` for appending
    pub fn open(dir: &Path, id: SegmentId) -> Result<Self> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            id,
            path,
            file,
            size,
        })
    }

    /// Append one encoded record, returning the offset it was written at
    pub fn append(&mut self, record: &[u8]) -> Result<u64> {
        let offset = self.size;
        self.file.write_all(record)?;
        self.size += record.len() as u64;
        Ok(offset)
    }

    /// Push written bytes to the OS
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Force written bytes to durable storage
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Segment id being written
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Bytes written so far
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Path of the segment file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
