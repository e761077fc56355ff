//! Hash operations.

use datatypes::Hash;
use storage::{DataType, Entry, HashMark};

use crate::{Db, Result};

/// Applies a Hash entry to the index. Shared by the write path and replay.
/// The entry's extra carries the field.
pub(crate) fn apply_hash_entry(hash: &mut Hash, entry: &Entry) -> Result<()> {
    match HashMark::try_from(entry.mark)? {
        HashMark::HSet => {
            hash.hset(&entry.key, entry.extra.clone(), entry.value.clone());
        }
        HashMark::HDel => {
            hash.hdel(&entry.key, &entry.extra);
        }
    }
    Ok(())
}

impl Db {
    /// Sets `field` to `value`, overwriting. Returns the field count after
    /// the set.
    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<usize> {
        self.check_key_value(key, &[value])?;
        let _door = self.door.read();

        let mut hashes = self.hash_index.write();
        let entry = Entry::new(
            DataType::Hash,
            HashMark::HSet as u16,
            key.to_vec(),
            value.to_vec(),
            field.to_vec(),
        );
        self.store(&entry)?;
        apply_hash_entry(&mut hashes, &entry)?;
        Ok(hashes.hlen(key))
    }

    /// Sets `field` only when absent. Returns whether it was set.
    pub fn hset_nx(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        self.check_key_value(key, &[value])?;
        let _door = self.door.read();

        let mut hashes = self.hash_index.write();
        if hashes.hexists(key, field) {
            return Ok(false);
        }

        let entry = Entry::new(
            DataType::Hash,
            HashMark::HSet as u16,
            key.to_vec(),
            value.to_vec(),
            field.to_vec(),
        );
        self.store(&entry)?;
        apply_hash_entry(&mut hashes, &entry)?;
        Ok(true)
    }

    /// The value of `field` in the hash at `key`.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> Option<Vec<u8>> {
        let _door = self.door.read();
        self.hash_index.read().hget(key, field).map(<[u8]>::to_vec)
    }

    /// Every field and value, interleaved. Order is unspecified.
    pub fn hget_all(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let _door = self.door.read();
        self.hash_index.read().hget_all(key)
    }

    /// Removes `fields`; returns how many were present.
    pub fn hdel(&self, key: &[u8], fields: &[&[u8]]) -> Result<usize> {
        self.check_key(key)?;
        let _door = self.door.read();

        let mut hashes = self.hash_index.write();
        let mut removed = 0;
        for field in fields {
            if !hashes.hexists(key, field) {
                continue;
            }
            let entry = Entry::new(
                DataType::Hash,
                HashMark::HDel as u16,
                key.to_vec(),
                Vec::new(),
                field.to_vec(),
            );
            self.store(&entry)?;
            apply_hash_entry(&mut hashes, &entry)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Whether `field` exists in the hash at `key`.
    pub fn hexists(&self, key: &[u8], field: &[u8]) -> bool {
        let _door = self.door.read();
        self.hash_index.read().hexists(key, field)
    }

    /// Number of fields in the hash at `key`.
    pub fn hlen(&self, key: &[u8]) -> usize {
        let _door = self.door.read();
        self.hash_index.read().hlen(key)
    }

    /// Every field name. Order is unspecified.
    pub fn hkeys(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let _door = self.door.read();
        self.hash_index.read().hkeys(key)
    }

    /// Every field value. Order is unspecified.
    pub fn hvalues(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let _door = self.door.read();
        self.hash_index.read().hvalues(key)
    }
}
