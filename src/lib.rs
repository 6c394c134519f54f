//! # CaskKV
//!
//! An embedded, log-structured key-value store with:
//! - Append-only segment files with size-based rollover
//! - An in-memory keydir for single-seek reads
//! - Crash recovery by replaying segments, tolerating a partial tail
//! - Merge to reclaim space from overwritten and deleted keys
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │        put/delete (write lock)   get/list_keys/fold          │
//! └──────────────┬─────────────────────────────┬────────────────┘
//!                │                             │
//!                ▼                             ▼
//!        ┌──────────────┐              ┌──────────────┐
//!        │ SegmentStore │◄─────────────│    Keydir    │
//!        │ (append/read)│   pointers   │   (RwLock)   │
//!        └──────┬───────┘              └──────▲───────┘
//!               │                             │ replay
//!               ▼                             │
//!        ┌──────────────┐              ┌──────┴───────┐
//!        │   Segments   │─────────────►│   Recovery   │
//!        │ 0000000N.data│              └──────────────┘
//!        └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use caskkv::Engine;
//! use std::path::Path;
//!
//! let engine = Engine::open_path(Path::new("./data")).unwrap();
//! engine.put(b"hello", b"world").unwrap();
//! assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
//! engine.close().unwrap();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod segment;
pub mod keydir;
pub mod engine;
pub mod merge;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::Config;
pub use engine::Engine;
pub use merge::{merge, MergeStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CaskKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
