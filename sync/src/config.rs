//! Sync queue configuration.
//!
//! Operational parameters: batch size, queue capacity, and retry pacing.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, SyncError};

/// Maximum hashes handed to the fetcher per `get_hashes` call.
pub const MAX_BLOCKS_ASK: usize = 120;

/// Maximum blocks kept in the pending queue by bulk appends.
pub const MAX_BLOCKS_QUEUED: usize = 300;

/// Pause of the import worker after a block without parent (in milliseconds).
pub const NO_PARENT_BACKOFF_MS: u64 = 2_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SyncConfig {
    pub max_blocks_ask: usize,
    pub max_blocks_queued: usize,
    pub no_parent_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_blocks_ask: MAX_BLOCKS_ASK,
            max_blocks_queued: MAX_BLOCKS_QUEUED,
            no_parent_backoff_ms: NO_PARENT_BACKOFF_MS,
        }
    }
}

impl SyncConfig {
    /// Load a YAML config. Missing keys take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SyncError::Config(format!("open {}: {e}", path.display())))?;
        let config: Self = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|e| SyncError::Config(format!("parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_blocks_ask == 0 {
            return Err(SyncError::Config("max_blocks_ask must be positive".into()));
        }
        if self.max_blocks_queued == 0 {
            return Err(SyncError::Config("max_blocks_queued must be positive".into()));
        }
        Ok(())
    }

    pub fn no_parent_backoff(&self) -> Duration {
        Duration::from_millis(self.no_parent_backoff_ms)
    }
}
