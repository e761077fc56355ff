//! # Datatypes — Composite In-Memory Indexes
//!
//! The four Redis-flavored composite structures the engine keeps per user
//! key: ordered [`List`], field-map [`Hash`], member [`Set`], and
//! score-ordered [`SortedSet`]. All of them live purely in memory and are
//! reconstructed on recovery by replaying the log; none of them holds file
//! pointers.
//!
//! Keys, members, fields and values are owned byte buffers throughout.

mod hash;
mod list;
mod set;
mod zset;

pub use hash::Hash;
pub use list::{InsertOption, List};
pub use set::Set;
pub use zset::SortedSet;
