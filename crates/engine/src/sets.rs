//! Set operations.

use datatypes::Set;
use storage::{DataType, Entry, SetMark};

use crate::{Db, Result};

/// Applies a Set entry to the index. Shared by the write path and replay.
/// For SMove the extra carries the destination key.
pub(crate) fn apply_set_entry(set: &mut Set, entry: &Entry) -> Result<()> {
    match SetMark::try_from(entry.mark)? {
        SetMark::SAdd => {
            set.sadd(&entry.key, entry.value.clone());
        }
        SetMark::SRem => {
            set.srem(&entry.key, &entry.value);
        }
        SetMark::SMove => {
            set.smove(&entry.key, &entry.extra, &entry.value);
        }
    }
    Ok(())
}

impl Db {
    /// Adds `members` to the set at `key`. Returns the cardinality after
    /// the adds.
    pub fn sadd(&self, key: &[u8], members: &[&[u8]]) -> Result<usize> {
        self.check_key_value(key, members)?;
        let _door = self.door.read();

        let mut sets = self.set_index.write();
        for member in members {
            if sets.sis_member(key, member) {
                continue;
            }
            let entry = Entry::no_extra(
                DataType::Set,
                SetMark::SAdd as u16,
                key.to_vec(),
                member.to_vec(),
            );
            self.store(&entry)?;
            apply_set_entry(&mut sets, &entry)?;
        }
        Ok(sets.scard(key))
    }

    /// Removes and returns up to `count` arbitrary members.
    pub fn spop(&self, key: &[u8], count: usize) -> Result<Vec<Vec<u8>>> {
        self.check_key(key)?;
        let _door = self.door.read();

        let mut sets = self.set_index.write();
        let victims = sets.arbitrary_members(key, count);
        for member in &victims {
            let entry = Entry::no_extra(
                DataType::Set,
                SetMark::SRem as u16,
                key.to_vec(),
                member.clone(),
            );
            self.store(&entry)?;
            apply_set_entry(&mut sets, &entry)?;
        }
        Ok(victims)
    }

    /// Whether `member` is in the set at `key`.
    pub fn sis_member(&self, key: &[u8], member: &[u8]) -> bool {
        let _door = self.door.read();
        self.set_index.read().sis_member(key, member)
    }

    /// `count > 0`: up to `count` distinct members; `count < 0`: `|count|`
    /// draws with replacement.
    pub fn srand_member(&self, key: &[u8], count: i64) -> Vec<Vec<u8>> {
        let _door = self.door.read();
        self.set_index.read().srand_member(key, count)
    }

    /// Removes `members`; returns how many were present.
    pub fn srem(&self, key: &[u8], members: &[&[u8]]) -> Result<usize> {
        self.check_key(key)?;
        let _door = self.door.read();

        let mut sets = self.set_index.write();
        let mut removed = 0;
        for member in members {
            if !sets.sis_member(key, member) {
                continue;
            }
            let entry = Entry::no_extra(
                DataType::Set,
                SetMark::SRem as u16,
                key.to_vec(),
                member.to_vec(),
            );
            self.store(&entry)?;
            apply_set_entry(&mut sets, &entry)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Moves `member` from `src` to `dst`. Returns false when `src` does
    /// not contain it.
    pub fn smove(&self, src: &[u8], dst: &[u8], member: &[u8]) -> Result<bool> {
        self.check_key(src)?;
        self.check_key(dst)?;
        self.check_value(member)?;
        let _door = self.door.read();

        let mut sets = self.set_index.write();
        if !sets.sis_member(src, member) {
            return Ok(false);
        }

        let entry = Entry::new(
            DataType::Set,
            SetMark::SMove as u16,
            src.to_vec(),
            member.to_vec(),
            dst.to_vec(),
        );
        self.store(&entry)?;
        apply_set_entry(&mut sets, &entry)?;
        Ok(true)
    }

    /// Cardinality of the set at `key`.
    pub fn scard(&self, key: &[u8]) -> usize {
        let _door = self.door.read();
        self.set_index.read().scard(key)
    }

    /// Every member. Order is unspecified.
    pub fn smembers(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let _door = self.door.read();
        self.set_index.read().smembers(key)
    }

    /// Deduplicated union of the sets at `keys`.
    pub fn sunion(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        let _door = self.door.read();
        self.set_index.read().sunion(keys)
    }

    /// Members of `keys[0]` absent from every other key; fewer than two
    /// keys yields nothing.
    pub fn sdiff(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        let _door = self.door.read();
        self.set_index.read().sdiff(keys)
    }
}
