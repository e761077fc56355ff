//! The engine error taxonomy.
//!
//! Argument violations (`EmptyKey`, `KeyTooLarge`, `ValueTooLarge`,
//! `InvalidTtl`, `ExtraContainsSeparator`) and precondition failures
//! (`ReclaimUnreached`) are reported at the call site with no log effect.
//! Absence signals (`KeyNotFound`, `KeyExpired`) are ordinary read results.
//! Integrity failures (`CorruptLog`, `SegmentMissing`, corrupt entries) are
//! fatal to the calling operation; during open they abort recovery. I/O
//! errors propagate unchanged.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The key is empty.
    #[error("key is empty")]
    EmptyKey,

    /// The key exceeds the configured `max_key_size`.
    #[error("key exceeds the configured maximum size")]
    KeyTooLarge,

    /// A value exceeds the configured `max_value_size`.
    #[error("value exceeds the configured maximum size")]
    ValueTooLarge,

    /// A TTL of zero (or negative) seconds was requested.
    #[error("ttl must be at least one second")]
    InvalidTtl,

    /// A user-supplied argument contains the reserved extra separator.
    #[error("argument contains the reserved separator \\0")]
    ExtraContainsSeparator,

    /// The key does not exist.
    #[error("key not found")]
    KeyNotFound,

    /// The key exists but is past its expiration deadline.
    #[error("key is expired")]
    KeyExpired,

    /// An indexer references a segment that is not in the segment set.
    #[error("no segment with id {0}")]
    SegmentMissing(u32),

    /// Replay hit a non-EOF decode error; names the segment and offset.
    #[error("corrupt log in segment {file_id} at offset {offset}: {source}")]
    CorruptLog {
        file_id: u32,
        offset: u64,
        #[source]
        source: storage::Error,
    },

    /// Fewer archived segments than the reclaim threshold. Benign; retry
    /// after more rotations.
    #[error("archived segment count has not reached the reclaim threshold")]
    ReclaimUnreached,

    /// Reopen was asked for a directory with no saved config file.
    #[error("no config file found under {0}")]
    ConfigNotFound(PathBuf),

    /// The configuration fails open-time validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A storage-layer failure (corrupt entry, segment full, ...).
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An engine Result.
pub type Result<T> = std::result::Result<T, Error>;
