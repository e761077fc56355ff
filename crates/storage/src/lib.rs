//! # Storage — Segmented Append-Only Log
//!
//! The durability substrate for the LagoonKV engine. Every accepted mutation
//! is framed as an [`Entry`] and appended to the *active* [`Segment`], a data
//! file capped at the configured block size. When an append would overflow
//! the cap, the engine seals the active segment into the archived set and
//! opens a fresh one under the next id. The log is the only source of truth:
//! the in-memory indexes are rebuilt by replaying every segment in id order.
//!
//! ## Entry frame
//!
//! ```text
//! [crc32(value): u32 LE][key_size: u32][value_size: u32][extra_size: u32]
//! [type: u16][mark: u16][key bytes][value bytes][extra bytes]
//! ```
//!
//! The header is a fixed 20 bytes, so a reader can always skip forward by
//! `ENTRY_HEADER_SIZE + key_size + value_size + extra_size`. A decoded key
//! size of zero is the end-of-data sentinel: valid entries never carry an
//! empty key, and the zero-filled tail of a pre-allocated memory-mapped
//! segment decodes to exactly that.
//!
//! ## Segment naming
//!
//! Segments live directly in the data directory as zero-padded 9-digit ids
//! plus `.data` (`000000000.data`, `000000001.data`, ...). [`build`] scans a
//! directory and returns the archived map plus the active id (the maximum).
//!
//! This crate also owns the two small sidecar records the engine persists at
//! close: the [`Meta`] record (active write offset) and the [`Expires`]
//! dictionary (key → absolute deadline in seconds).

mod entry;
mod segment;
mod sidecar;

use std::io;

use thiserror::Error;

pub use entry::{
    DataType, Entry, HashMark, ListMark, SetMark, StrMark, ZSetMark, ENTRY_HEADER_SIZE,
};
pub use segment::{build, segment_file_name, RwMethod, Segment, SEGMENT_FILE_EXT};
pub use sidecar::{Expires, Meta};

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The read offset is at (or past) the end of the segment's data.
    #[error("end of segment data")]
    Eof,

    /// An entry failed to decode: CRC mismatch, truncated payload, or an
    /// unknown type/mark tag.
    #[error("corrupt entry: {0}")]
    CorruptEntry(String),

    /// An append would exceed the segment capacity; the caller must rotate.
    #[error("segment full: entry needs {need} bytes, {remaining} remain")]
    SegmentFull { need: u64, remaining: u64 },

    /// An entry with an empty key was handed to the write path.
    #[error("entry key is empty")]
    EmptyEntry,
}

/// A storage Result.
pub type Result<T> = std::result::Result<T, Error>;
