//! Configuration for CaskKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CaskError, Result};

/// Default active segment size that triggers a rollover (32 MiB)
pub const DEFAULT_ROLLOVER_THRESHOLD: u64 = 32 * 1024 * 1024;

/// Main configuration for a CaskKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the segment files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── 00000001.data
    ///     ├── 00000002.data
    ///     └── ...            (highest id = active segment)
    pub data_dir: PathBuf,

    /// Open for appends. A read-only handle never creates a segment and
    /// rejects every mutating call.
    pub read_write: bool,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// fsync the active segment after every put/delete
    pub sync_on_put: bool,

    // -------------------------------------------------------------------------
    // Segment Configuration
    // -------------------------------------------------------------------------
    /// Active segment size (bytes) above which the next append rolls over
    pub rollover_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./caskkv_data"),
            read_write: true,
            sync_on_put: false,
            rollover_threshold: DEFAULT_ROLLOVER_THRESHOLD,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the configuration can be used to open an engine
    pub fn validate(&self) -> Result<()> {
        if self.rollover_threshold == 0 {
            return Err(CaskError::Config(
                "rollover_threshold must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Open for reads and writes (`true`) or reads only (`false`)
    pub fn read_write(mut self, read_write: bool) -> Self {
        self.config.read_write = read_write;
        self
    }

    /// Force a durable flush after every put/delete
    pub fn sync_on_put(mut self, sync: bool) -> Self {
        self.config.sync_on_put = sync;
        self
    }

    /// Set the rollover threshold (in bytes)
    pub fn rollover_threshold(mut self, bytes: u64) -> Self {
        self.config.rollover_threshold = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
