//! Log reclamation: rewrites live entries from the archived segments into
//! a fresh segment sequence, discarding everything dead.
//!
//! Runs under the exclusive engine lock. Scratch segments are numbered
//! from 0 in their own sequence and renamed into the data directory only
//! after the whole rewrite succeeds; string indexer relocations are
//! buffered and applied last. A failed reclaim therefore leaves the
//! in-memory state untouched, and the scratch directory is removed on
//! every exit path. The active segment is never rewritten.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use storage::{
    segment_file_name, DataType, Entry, HashMark, ListMark, Segment, SetMark, StrMark, ZSetMark,
};

use crate::{now, zsets, Db, Error, IdxMode, Result, RECLAIM_DIR_NAME};

/// Scratch directory with guaranteed cleanup.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn create(path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

impl Db {
    /// Rewrites live archived entries into a fresh segment set and installs
    /// it in place of the old one.
    ///
    /// # Errors
    ///
    /// [`Error::ReclaimUnreached`] when fewer archived segments exist than
    /// the configured threshold (benign; retry after more rotations).
    /// Integrity and I/O failures abort the rewrite with the old segment
    /// set still installed.
    pub fn reclaim(&self) -> Result<()> {
        let _door = self.door.write();

        let mut log = self.log.write();
        if log.archived.len() < self.config.reclaim_threshold {
            return Err(Error::ReclaimUnreached);
        }
        let before = log.archived.len();

        let scratch = ScratchDir::create(self.config.dir_path.join(RECLAIM_DIR_NAME))?;

        // Walk the archived segments in id order, appending every live
        // entry to the scratch sequence in scan order. Order matters:
        // list marks replay positionally.
        let mut fresh: Vec<Segment> = Vec::new();
        let mut relocations: Vec<(Vec<u8>, u32, u64)> = Vec::new();

        for (&file_id, segment) in &log.archived {
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
                let size = entry.size();

                if self.entry_is_live(&entry, offset, file_id) {
                    let rotate = fresh
                        .last()
                        .map_or(true, |s| s.offset() + size > self.config.block_size);
                    if rotate {
                        fresh.push(Segment::open(
                            scratch.path(),
                            fresh.len() as u32,
                            self.config.rw_method,
                            self.config.block_size,
                        )?);
                    }
                    if let Some(target) = fresh.last_mut() {
                        let new_offset = target.write(&entry)?;
                        if entry.data_type == DataType::String {
                            relocations.push((entry.key.clone(), target.id(), new_offset));
                        }
                    }
                }

                offset += size;
            }
        }

        for segment in &fresh {
            segment.sync()?;
        }

        let fresh_count = fresh.len() as u32;
        let old_paths: Vec<(u32, PathBuf)> = log
            .archived
            .iter()
            .map(|(id, segment)| (*id, segment.path().to_path_buf()))
            .collect();

        // Release scratch handles before the renames.
        drop(fresh);

        // Install: rename each scratch segment over its final name (ids
        // restart at 0, so the low old ids are replaced in place), reopen,
        // then delete the leftover high-id files.
        let mut installed = BTreeMap::new();
        for id in 0..fresh_count {
            let name = segment_file_name(id);
            fs::rename(
                scratch.path().join(&name),
                self.config.dir_path.join(&name),
            )?;
            installed.insert(
                id,
                Segment::open(
                    &self.config.dir_path,
                    id,
                    self.config.rw_method,
                    self.config.block_size,
                )?,
            );
        }

        let displaced = std::mem::replace(&mut log.archived, installed);
        drop(displaced);
        for (id, path) in &old_paths {
            if *id >= fresh_count {
                let _ = fs::remove_file(path);
            }
        }

        // Repoint the string indexers at the rewritten locations.
        let mut strs = self.str_index.write();
        for (key, file_id, offset) in relocations {
            if let Some(indexer) = strs.list.get_mut(&key) {
                indexer.file_id = file_id;
                indexer.offset = offset;
            }
        }

        info!(before, after = log.archived.len(), "reclaimed archived segments");
        Ok(())
    }

    /// The per-type liveness predicate: whether the entry scanned at
    /// (`file_id`, `offset`) still contributes to current state.
    fn entry_is_live(&self, entry: &Entry, offset: u64, file_id: u32) -> bool {
        match entry.data_type {
            DataType::String => {
                if entry.mark != StrMark::Set as u16 {
                    return false;
                }
                let strs = self.str_index.read();
                if strs
                    .expires
                    .deadline(&entry.key)
                    .is_some_and(|deadline| deadline < now())
                {
                    return false;
                }
                let Some(indexer) = strs.list.get(&entry.key) else {
                    return false;
                };
                // Only the entry the indexer points at is current; stale
                // overwrites and deleted keys fail here.
                if indexer.file_id != file_id || indexer.offset != offset {
                    return false;
                }
                if self.config.idx_mode == IdxMode::KeyValueRam
                    && indexer.value.as_deref() != Some(entry.value.as_slice())
                {
                    return false;
                }
                true
            }
            // Push/insert/set marks are not commutative: all of them are
            // preserved so ordered replay can rebuild the list. Pops and
            // trims only ever mattered for replay order.
            DataType::List => matches!(
                ListMark::try_from(entry.mark),
                Ok(ListMark::LPush | ListMark::RPush | ListMark::LInsert | ListMark::LSet)
            ),
            DataType::Hash => {
                entry.mark == HashMark::HSet as u16
                    && self.hash_index.read().hget(&entry.key, &entry.extra)
                        == Some(entry.value.as_slice())
            }
            DataType::Set => match SetMark::try_from(entry.mark) {
                Ok(SetMark::SAdd) => self.set_index.read().sis_member(&entry.key, &entry.value),
                Ok(SetMark::SMove) => {
                    // The member must have ended up in the destination.
                    self.set_index.read().sis_member(&entry.extra, &entry.value)
                }
                _ => false,
            },
            DataType::ZSet => {
                if entry.mark != ZSetMark::ZAdd as u16 {
                    return false;
                }
                let Ok(score) = zsets::parse_score(&entry.extra) else {
                    return false;
                };
                self.zset_index
                    .read()
                    .zscore(&entry.key, &entry.value)
                    .is_some_and(|current| current.to_bits() == score.to_bits())
            }
        }
    }
}
