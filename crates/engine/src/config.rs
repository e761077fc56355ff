//! Database configuration.
//!
//! The engine consumes a populated [`Config`] record; parsing config files
//! is the launcher's job. The record is serialized to `db.cfg` at close so
//! [`crate::Db::reopen`] can restart a directory without the caller
//! re-supplying options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use storage::RwMethod;

/// Default server address hint, unused by the core.
pub const DEFAULT_ADDR: &str = "127.0.0.1:6470";

/// Default segment capacity: 16 MiB.
pub const DEFAULT_BLOCK_SIZE: u64 = 16 * 1024 * 1024;

/// Default maximum key size: 128 bytes.
pub const DEFAULT_MAX_KEY_SIZE: u32 = 128;

/// Default maximum value size: 1 MiB.
pub const DEFAULT_MAX_VALUE_SIZE: u32 = 1024 * 1024;

/// Default archived-segment count permitting reclamation.
pub const DEFAULT_RECLAIM_THRESHOLD: usize = 4;

/// How much of each entry the in-memory index keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdxMode {
    /// Keys and values both live in memory; reads never touch disk.
    KeyValueRam,
    /// Only keys (and file positions) live in memory; reads fetch the
    /// value from the owning segment.
    KeyOnlyRam,
}

/// The recognized options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host:port hint for the external server; recognized, unused here.
    pub addr: String,
    /// Directory holding segments and sidecars.
    pub dir_path: PathBuf,
    /// Segment capacity in bytes.
    pub block_size: u64,
    /// Standard or memory-mapped segment I/O.
    pub rw_method: RwMethod,
    /// Index mode: cached values or key-only with on-demand reads.
    pub idx_mode: IdxMode,
    pub max_key_size: u32,
    pub max_value_size: u32,
    /// Fsync after every append.
    pub sync: bool,
    /// Minimum archived count permitting reclamation.
    pub reclaim_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            dir_path: std::env::temp_dir().join("lagoonkv"),
            block_size: DEFAULT_BLOCK_SIZE,
            rw_method: RwMethod::FileIo,
            idx_mode: IdxMode::KeyValueRam,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            sync: false,
            reclaim_threshold: DEFAULT_RECLAIM_THRESHOLD,
        }
    }
}

impl Config {
    /// A default config rooted at `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir_path: dir.into(),
            ..Self::default()
        }
    }
}
