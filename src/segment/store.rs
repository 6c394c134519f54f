//! Segment Store
//!
//! Owns the active segment and the cache of read handles.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{CaskError, Result};
use crate::record::{decode_header, Record, HEADER_SIZE};

use super::{list_segments, next_segment_id, segment_path, SegmentId, SegmentWriter};

/// Manages the segment files of one data directory
///
/// ## Concurrency:
/// - `active`: Mutex, appends are serialized (callers also hold the engine's
///   write lock)
/// - `readers`: RwLock over the handle map; each handle has its own Mutex
///   because reading requires seeking
/// - All methods use `&self`
pub struct SegmentStore {
    /// Directory where segments are stored
    dir: PathBuf,

    /// Active-segment size that triggers rollover after an append
    rollover_threshold: u64,

    /// Segment accepting appends; `None` in read-only mode
    active: Mutex<Option<SegmentWriter>>,

    /// Lazily opened read handles, kept until close
    readers: RwLock<HashMap<SegmentId, Arc<Mutex<File>>>>,
}

impl SegmentStore {
    /// Open the store without an active segment (read-only until
    /// `open_active` is called)
    pub fn open(dir: &Path, rollover_threshold: u64) -> Result<Self> {
        fs::create_dir_all(dir)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            rollover_threshold,
            active: Mutex::new(None),
            readers: RwLock::new(HashMap::new()),
        })
    }

    /// Create a fresh active segment with id = max existing + 1 (or 1)
    ///
    /// Any previous active segment is flushed and released for writing.
    pub fn open_active(&self) -> Result<SegmentId> {
        let mut active = self.active.lock();
        self.roll(&mut active)
    }

    /// Append an encoded record to the active segment
    ///
    /// Returns `(segment_id, offset)` of the written record.
    pub fn append(&self, record: &[u8]) -> Result<(SegmentId, u64)> {
        let mut active = self.active.lock();
        let writer = active.as_mut().ok_or(CaskError::ReadOnly)?;
        let offset = writer.append(record)?;
        Ok((writer.id(), offset))
    }

    /// Roll over if the active segment has grown past the threshold
    ///
    /// Returns the new active id when a rollover happened.
    pub fn maybe_rollover(&self) -> Result<Option<SegmentId>> {
        let mut active = self.active.lock();
        let (old_id, size) = match active.as_ref() {
            Some(writer) => (writer.id(), writer.size()),
            None => return Ok(None),
        };

        if size <= self.rollover_threshold {
            return Ok(None);
        }

        let new_id = self.roll(&mut active)?;
        tracing::debug!(old_segment = old_id, new_segment = new_id, size, "segment rollover");
        Ok(Some(new_id))
    }

    /// Force the active segment to durable storage (no-op when read-only)
    pub fn sync(&self) -> Result<()> {
        if let Some(writer) = self.active.lock().as_mut() {
            writer.sync()?;
        }
        Ok(())
    }

    /// Read the full record stored at `offset` in segment `id`
    ///
    /// The header is decoded from disk rather than trusted from the caller.
    pub fn read_record(&self, id: SegmentId, offset: u64) -> Result<Record> {
        let handle = self.read_handle(id)?;
        let mut file = handle.lock();

        file.seek(SeekFrom::Start(offset))?;

        let mut header_buf = [0u8; HEADER_SIZE];
        read_exact_or_corrupt(&mut *file, &mut header_buf, id, offset)?;
        let header = decode_header(&header_buf).ok_or_else(|| {
            CaskError::Corruption(format!("short header in segment {} at {}", id, offset))
        })?;

        let mut key = vec![0u8; header.key_len as usize];
        read_exact_or_corrupt(&mut *file, &mut key, id, offset)?;

        // Declared value bytes are consumed even for tombstones
        let mut value = vec![0u8; header.value_len as usize];
        read_exact_or_corrupt(&mut *file, &mut value, id, offset)?;
        if header.tombstone {
            value.clear();
        }

        Ok(Record {
            key,
            value,
            tombstone: header.tombstone,
            timestamp: header.timestamp,
        })
    }

    /// Cached read handle for segment `id`, opened on first use
    pub fn read_handle(&self, id: SegmentId) -> Result<Arc<Mutex<File>>> {
        if let Some(handle) = self.readers.read().get(&id) {
            return Ok(Arc::clone(handle));
        }

        let mut readers = self.readers.write();
        // Another reader may have opened it between the two locks
        if let Some(handle) = readers.get(&id) {
            return Ok(Arc::clone(handle));
        }

        let file = File::open(segment_path(&self.dir, id))?;
        let handle = Arc::new(Mutex::new(file));
        readers.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Drop the cached read handle for `id` (before deleting the file)
    pub fn evict(&self, id: SegmentId) {
        self.readers.write().remove(&id);
    }

    /// Delete segment files, best effort
    ///
    /// Each read handle is evicted before its file is removed. Returns
    /// `(removed, failed)`; failures are logged and skipped.
    pub fn remove_segments(&self, ids: &[SegmentId]) -> (u64, u64) {
        let mut removed = 0;
        let mut failed = 0;

        for &id in ids {
            self.evict(id);
            match fs::remove_file(segment_path(&self.dir, id)) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(segment_id = id, error = %e, "failed to remove segment");
                    failed += 1;
                }
            }
        }

        (removed, failed)
    }

    /// Flush the active segment and release every handle
    pub fn close(&self) -> Result<()> {
        let mut active = self.active.lock();
        if let Some(writer) = active.as_mut() {
            writer.flush()?;
        }
        *active = None;
        self.readers.write().clear();
        Ok(())
    }

    /// Replace the active segment with a new one at the next free id
    ///
    /// On failure the previous active segment stays in place.
    fn roll(&self, active: &mut Option<SegmentWriter>) -> Result<SegmentId> {
        if let Some(previous) = active.as_mut() {
            previous.flush()?;
        }

        let id = next_segment_id(&self.dir)?;
        let writer = SegmentWriter::open(&self.dir, id)?;
        tracing::debug!(segment_id = id, path = %writer.path().display(), "opened active segment");
        *active = Some(writer);

        Ok(id)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Id of the active segment, `None` in read-only mode
    pub fn active_id(&self) -> Option<SegmentId> {
        self.active.lock().as_ref().map(|w| w.id())
    }

    /// Segment ids currently on disk, ascending
    pub fn segment_ids(&self) -> Result<Vec<SegmentId>> {
        list_segments(&self.dir)
    }

    /// Number of cached read handles
    pub fn cached_readers(&self) -> usize {
        self.readers.read().len()
    }

    /// Directory holding the segments
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// `read_exact`, reporting a short read as corruption of the addressed record
fn read_exact_or_corrupt(
    file: &mut File,
    buf: &mut [u8],
    id: SegmentId,
    offset: u64,
) -> Result<()> {
    file.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CaskError::Corruption(format!(
            "record in segment {} at offset {} is shorter than its header declares",
            id, offset
        )),
        _ => CaskError::Io(e),
    })
}
