//! Index reconstruction by log replay.
//!
//! Cold start walks every segment in ascending id order (archived first,
//! the active file last) and feeds each decoded entry through the same
//! per-type builders the write path uses. Replaying the full log from
//! scratch therefore lands on exactly the state incremental application
//! built — the recovery-idempotence guarantee.

use std::collections::BTreeMap;

use tracing::debug;

use datatypes::{Hash, List, Set, SortedSet};
use index::SkipList;
use storage::{DataType, Entry, Expires, Segment};

use crate::{hashes, lists, sets, strings, zsets, Config, Error, Result, StrIndex};

/// The five in-memory indexes, built up during replay and then moved into
/// the `Db` locks.
pub(crate) struct Indexes {
    pub strs: StrIndex,
    pub lists: List,
    pub hashes: Hash,
    pub sets: Set,
    pub zsets: SortedSet,
}

impl Indexes {
    pub(crate) fn new(expires: Expires) -> Self {
        Self {
            strs: StrIndex {
                list: SkipList::new(),
                expires,
            },
            lists: List::new(),
            hashes: Hash::new(),
            sets: Set::new(),
            zsets: SortedSet::new(),
        }
    }
}

/// Replays every segment into `indexes`, returning the end offset of the
/// active segment's data.
///
/// # Errors
///
/// Any non-EOF decode failure aborts the open with [`Error::CorruptLog`],
/// naming the segment and offset.
pub(crate) fn load_indexes(
    config: &Config,
    archived: &BTreeMap<u32, Segment>,
    active: &Segment,
    active_id: u32,
    indexes: &mut Indexes,
) -> Result<u64> {
    let mut active_end = 0u64;
    let mut replayed = 0usize;

    let segments = archived
        .iter()
        .map(|(id, segment)| (*id, segment))
        .chain(std::iter::once((active_id, active)));

    for (file_id, segment) in segments {
        let mut offset = 0u64;
        loop {
            let entry = match segment.read(offset) {
                Ok(entry) => entry,
                Err(storage::Error::Eof) => break,
                Err(source) => {
                    return Err(Error::CorruptLog {
                        file_id,
                        offset,
                        source,
                    })
                }
            };

            apply_entry(config, indexes, &entry, file_id, offset).map_err(|e| match e {
                Error::Storage(source) => Error::CorruptLog {
                    file_id,
                    offset,
                    source,
                },
                other => other,
            })?;

            offset += entry.size();
            replayed += 1;
        }

        if file_id == active_id {
            active_end = offset;
        }
    }

    debug!(entries = replayed, "replayed log");
    Ok(active_end)
}

/// Routes one entry to its type's builder.
fn apply_entry(
    config: &Config,
    indexes: &mut Indexes,
    entry: &Entry,
    file_id: u32,
    offset: u64,
) -> Result<()> {
    match entry.data_type {
        DataType::String => {
            strings::apply_string_entry(config.idx_mode, &mut indexes.strs, entry, file_id, offset)
        }
        DataType::List => lists::apply_list_entry(&mut indexes.lists, entry),
        DataType::Hash => hashes::apply_hash_entry(&mut indexes.hashes, entry),
        DataType::Set => sets::apply_set_entry(&mut indexes.sets, entry),
        DataType::ZSet => zsets::apply_zset_entry(&mut indexes.zsets, entry),
    }
}
