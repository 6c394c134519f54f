//! Record codec
//!
//! Encodes records into their on-disk bytes and decodes fixed-width headers.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CaskError, Result};

use super::{RecordHeader, HEADER_SIZE};

/// Encode a record: header, then key, then value (omitted for tombstones).
///
/// Fails only when a length does not fit the u32 header field.
pub fn encode(key: &[u8], value: &[u8], tombstone: bool, timestamp: u64) -> Result<Bytes> {
    let key_len =
        u32::try_from(key.len()).map_err(|_| CaskError::KeyTooLarge { len: key.len() })?;
    let value: &[u8] = if tombstone { &[] } else { value };
    let value_len =
        u32::try_from(value.len()).map_err(|_| CaskError::ValueTooLarge { len: value.len() })?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + key.len() + value.len());
    buf.put_u32(key_len);
    buf.put_u32(value_len);
    buf.put_u8(tombstone as u8);
    buf.put_u64(timestamp);
    buf.put_slice(key);
    buf.put_slice(value);

    Ok(buf.freeze())
}

/// Decode a header from the start of `buf`.
///
/// Returns `None` when fewer than `HEADER_SIZE` bytes are available, so a
/// caller can tell a truncated tail apart from a valid record.
pub fn decode_header(buf: &[u8]) -> Option<RecordHeader> {
    if buf.len() < HEADER_SIZE {
        return None;
    }

    let mut cursor = &buf[..HEADER_SIZE];
    let key_len = cursor.get_u32();
    let value_len = cursor.get_u32();
    let tombstone = cursor.get_u8() == 1;
    let timestamp = cursor.get_u64();

    Some(RecordHeader {
        key_len,
        value_len,
        tombstone,
        timestamp,
    })
}
