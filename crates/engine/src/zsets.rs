//! Sorted-set operations.
//!
//! Scores travel through the log as their shortest round-trip decimal form
//! in the entry's extra. ZAdd and ZRem are the only persisted marks; rank
//! queries are answered from memory.

use datatypes::SortedSet;
use storage::{DataType, Entry, ZSetMark};

use crate::{Db, Error, Result};

/// Applies a ZSet entry to the index. Shared by the write path and replay.
/// The entry's value is the member; for ZAdd the extra is the score.
pub(crate) fn apply_zset_entry(zset: &mut SortedSet, entry: &Entry) -> Result<()> {
    match ZSetMark::try_from(entry.mark)? {
        ZSetMark::ZAdd => {
            let score = parse_score(&entry.extra)?;
            zset.zadd(&entry.key, score, entry.value.clone());
        }
        ZSetMark::ZRem => {
            zset.zrem(&entry.key, &entry.value);
        }
    }
    Ok(())
}

pub(crate) fn parse_score(extra: &[u8]) -> Result<f64> {
    std::str::from_utf8(extra)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            Error::Storage(storage::Error::CorruptEntry(
                "non-numeric score extra".to_string(),
            ))
        })
}

pub(crate) fn format_score(score: f64) -> Vec<u8> {
    format!("{score}").into_bytes()
}

impl Db {
    /// Adds `member` with `score`, replacing any previous score. Re-adding
    /// with an unchanged score appends nothing.
    pub fn zadd(&self, key: &[u8], score: f64, member: &[u8]) -> Result<()> {
        self.check_key_value(key, &[member])?;
        let _door = self.door.read();

        let mut zsets = self.zset_index.write();
        if zsets
            .zscore(key, member)
            .is_some_and(|current| current.to_bits() == score.to_bits())
        {
            return Ok(());
        }

        let entry = Entry::new(
            DataType::ZSet,
            ZSetMark::ZAdd as u16,
            key.to_vec(),
            member.to_vec(),
            format_score(score),
        );
        self.store(&entry)?;
        apply_zset_entry(&mut zsets, &entry)?;
        Ok(())
    }

    /// The score of `member`, if present.
    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Option<f64> {
        let _door = self.door.read();
        self.zset_index.read().zscore(key, member)
    }

    /// Whether `member` is in the sorted set at `key`.
    pub fn zis_member(&self, key: &[u8], member: &[u8]) -> bool {
        let _door = self.door.read();
        self.zset_index.read().zis_member(key, member)
    }

    /// Removes `members`; returns how many were present.
    pub fn zrem(&self, key: &[u8], members: &[&[u8]]) -> Result<usize> {
        self.check_key(key)?;
        let _door = self.door.read();

        let mut zsets = self.zset_index.write();
        let mut removed = 0;
        for member in members {
            if !zsets.zis_member(key, member) {
                continue;
            }
            let entry = Entry::no_extra(
                DataType::ZSet,
                ZSetMark::ZRem as u16,
                key.to_vec(),
                member.to_vec(),
            );
            self.store(&entry)?;
            apply_zset_entry(&mut zsets, &entry)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Cardinality of the sorted set at `key`.
    pub fn zcard(&self, key: &[u8]) -> usize {
        let _door = self.door.read();
        self.zset_index.read().zcard(key)
    }

    /// Ascending 0-based rank of `member`, ordered by (score, member).
    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        let _door = self.door.read();
        self.zset_index.read().zrank(key, member)
    }

    /// Members with scores in rank range `[start, end]` inclusive,
    /// ascending; negative ranks count from the top.
    pub fn zrange(&self, key: &[u8], start: i64, end: i64) -> Vec<(Vec<u8>, f64)> {
        let _door = self.door.read();
        self.zset_index.read().zrange(key, start, end)
    }
}
