//! Error types for CaskKV
//!
//! Provides a unified error type for all operations.
//!
//! A missing or deleted key is not an error (`get` returns `Ok(None)`), and a
//! truncated segment tail is reported by recovery statistics rather than here.

use thiserror::Error;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for CaskKV operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("Store is open in read-only mode")]
    ReadOnly,

    #[error("Key of {len} bytes exceeds the u32 length field")]
    KeyTooLarge { len: usize },

    #[error("Value of {len} bytes exceeds the u32 length field")]
    ValueTooLarge { len: usize },

    // -------------------------------------------------------------------------
    // Data Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Merge Errors
    // -------------------------------------------------------------------------
    #[error("Merge aborted: {0}")]
    MergeAborted(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
