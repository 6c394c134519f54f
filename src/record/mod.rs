//! Record Module
//!
//! The immutable on-disk unit appended to segment files.
//!
//! ## Record Format
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Header (17 bytes, big-endian)                                 │
//! │ ┌────────────┬──────────────┬───────────────┬───────────────┐ │
//! │ │ KeyLen (4) │ ValueLen (4) │ Tombstone (1) │ Timestamp (8) │ │
//! │ └────────────┴──────────────┴───────────────┴───────────────┘ │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Key   (KeyLen bytes)                                          │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Value (ValueLen bytes, written empty when Tombstone = 1)      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no checksum: only size-based truncation is detectable.

mod codec;

use std::time::{SystemTime, UNIX_EPOCH};

pub use codec::{decode_header, encode};

/// Header size: KeyLen (4) + ValueLen (4) + Tombstone (1) + Timestamp (8)
pub const HEADER_SIZE: usize = 17;

/// Decoded fixed-width record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub key_len: u32,
    pub value_len: u32,
    pub tombstone: bool,
    /// Diagnostic only; never used to order records
    pub timestamp: u64,
}

impl RecordHeader {
    /// Bytes that follow the header on disk
    ///
    /// The declared value length counts even for a tombstone.
    pub fn payload_len(&self) -> u64 {
        self.key_len as u64 + self.value_len as u64
    }

    /// Total on-disk length of the record, header included
    pub fn record_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.payload_len()
    }
}

/// A full record as written by the write path and by merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub tombstone: bool,
    pub timestamp: u64,
}

impl Record {
    /// A live key-value record
    pub fn put(key: Vec<u8>, value: Vec<u8>, timestamp: u64) -> Self {
        Self {
            key,
            value,
            tombstone: false,
            timestamp,
        }
    }

    /// A deletion marker with an empty value
    pub fn tombstone(key: Vec<u8>, timestamp: u64) -> Self {
        Self {
            key,
            value: Vec::new(),
            tombstone: true,
            timestamp,
        }
    }

    /// Serialize header + key + value
    pub fn encode(&self) -> crate::Result<bytes::Bytes> {
        encode(&self.key, &self.value, self.tombstone, self.timestamp)
    }
}

/// Wall-clock unix milliseconds for the diagnostic timestamp field
pub fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
