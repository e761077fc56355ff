//! String operations: point reads and writes, TTLs, prefix and range scans.
//!
//! Expiration is lazy. Point reads (`get`, `str_exists`, `str_len`, `ttl`)
//! take the String lock as an upgradable read; a key found past its
//! deadline upgrades to write, drops the key from both the expiration map
//! and the skip list, and appends a String-remove entry so recovery
//! converges. Scans skip expired keys without mutating.

use parking_lot::RwLockUpgradableReadGuard;
use tracing::warn;

use index::Indexer;
use storage::{DataType, Entry, StrMark};

use crate::{now, Db, Error, IdxMode, Result, StrIndex};

/// Applies a String entry to the index. Shared by the write path and
/// replay, which is what makes recovery reproduce the online state.
pub(crate) fn apply_string_entry(
    idx_mode: IdxMode,
    strs: &mut StrIndex,
    entry: &Entry,
    file_id: u32,
    offset: u64,
) -> Result<()> {
    match StrMark::try_from(entry.mark)? {
        StrMark::Set => {
            let indexer = Indexer {
                key: entry.key.clone(),
                value: (idx_mode == IdxMode::KeyValueRam).then(|| entry.value.clone()),
                value_size: entry.value.len() as u32,
                file_id,
                entry_size: entry.size() as u32,
                offset,
            };
            strs.list.put(entry.key.clone(), indexer);
        }
        StrMark::Remove => {
            strs.list.remove(&entry.key);
        }
    }
    Ok(())
}

pub(crate) fn past_deadline(strs: &StrIndex, key: &[u8]) -> bool {
    strs.expires.deadline(key).is_some_and(|d| now() > d)
}

impl Db {
    /// Sets `key` to `value`, overwriting any previous value and clearing
    /// any expiration.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.do_set(key, value)
    }

    /// Sets `key` only when it does not already exist. Returns whether the
    /// value was set.
    pub fn set_nx(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        if self.str_exists(key) {
            return Ok(false);
        }
        self.set(key, value)?;
        Ok(true)
    }

    /// The value stored at `key`.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] for an absent key, [`Error::KeyExpired`] on
    /// the first read past the deadline (the key is removed and a remove
    /// entry appended).
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key(key)?;
        let _door = self.door.read();

        let strs = self.str_index.upgradable_read();
        if !strs.list.exist(key) {
            return Err(Error::KeyNotFound);
        }
        if past_deadline(&strs, key) {
            let mut strs = RwLockUpgradableReadGuard::upgrade(strs);
            self.remove_expired(&mut strs, key);
            return Err(Error::KeyExpired);
        }

        let indexer = strs.list.get(key).ok_or(Error::KeyNotFound)?;
        self.value_of(indexer)
    }

    /// Sets `key` to `value` and returns the previous value.
    pub fn get_set(&self, key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        let old = self.get(key)?;
        self.set(key, value)?;
        Ok(old)
    }

    /// Appends `value` to the value at `key`; an absent (or expired) key
    /// behaves like a plain set.
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key_value(key, &[value])?;

        let mut combined = match self.get(key) {
            Ok(existing) => existing,
            Err(Error::KeyNotFound | Error::KeyExpired) => Vec::new(),
            Err(e) => return Err(e),
        };
        combined.extend_from_slice(value);
        self.do_set(key, &combined)
    }

    /// Length of the value at `key`; 0 when absent or expired.
    pub fn str_len(&self, key: &[u8]) -> usize {
        if self.check_key(key).is_err() {
            return 0;
        }
        let _door = self.door.read();

        let strs = self.str_index.upgradable_read();
        if !strs.list.exist(key) {
            return 0;
        }
        if past_deadline(&strs, key) {
            let mut strs = RwLockUpgradableReadGuard::upgrade(strs);
            self.remove_expired(&mut strs, key);
            return 0;
        }
        strs.list.get(key).map_or(0, |i| i.value_size as usize)
    }

    /// Whether `key` exists (and is not expired).
    pub fn str_exists(&self, key: &[u8]) -> bool {
        if self.check_key(key).is_err() {
            return false;
        }
        let _door = self.door.read();

        let strs = self.str_index.upgradable_read();
        if !strs.list.exist(key) {
            return false;
        }
        if past_deadline(&strs, key) {
            let mut strs = RwLockUpgradableReadGuard::upgrade(strs);
            self.remove_expired(&mut strs, key);
            return false;
        }
        true
    }

    /// Removes `key`. Removing an absent key is a no-op.
    pub fn str_rem(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let _door = self.door.read();

        let mut strs = self.str_index.write();
        if !strs.list.exist(key) {
            return Ok(());
        }

        let entry = Entry::no_extra(
            DataType::String,
            StrMark::Remove as u16,
            key.to_vec(),
            Vec::new(),
        );
        let at = self.store(&entry)?;
        apply_string_entry(self.config.idx_mode, &mut strs, &entry, at.file_id, at.offset)?;
        strs.expires.remove(key);
        Ok(())
    }

    /// Values of keys sharing `prefix`, in ascending key order. `offset`
    /// skips that many matches; a negative `limit` returns all.
    pub fn prefix_scan(&self, prefix: &[u8], limit: i64, offset: usize) -> Result<Vec<Vec<u8>>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.check_key(prefix)?;
        let _door = self.door.read();

        let strs = self.str_index.read();
        let mut values = Vec::new();
        let mut to_skip = offset;
        for (key, indexer) in strs.list.iter_from(prefix) {
            if !key.starts_with(prefix) {
                break;
            }
            if past_deadline(&strs, key) {
                continue;
            }
            if to_skip > 0 {
                to_skip -= 1;
                continue;
            }
            values.push(self.value_of(indexer)?);
            if limit > 0 && values.len() as i64 == limit {
                break;
            }
        }
        Ok(values)
    }

    /// Values of keys in `[start, end]` inclusive, ascending.
    pub fn range_scan(&self, start: &[u8], end: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.check_key(start)?;
        self.check_key(end)?;
        let _door = self.door.read();

        let strs = self.str_index.read();
        let mut values = Vec::new();
        for (key, indexer) in strs.list.iter_from(start) {
            if key > end {
                break;
            }
            if past_deadline(&strs, key) {
                continue;
            }
            values.push(self.value_of(indexer)?);
        }
        Ok(values)
    }

    /// Expires `key` after `seconds` (whole seconds from now).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTtl`] for a zero TTL, [`Error::KeyNotFound`] for an
    /// absent key.
    pub fn expire(&self, key: &[u8], seconds: u64) -> Result<()> {
        if !self.str_exists(key) {
            return Err(Error::KeyNotFound);
        }
        if seconds == 0 {
            return Err(Error::InvalidTtl);
        }

        let _door = self.door.read();
        let mut strs = self.str_index.write();
        strs.expires.set(key.to_vec(), now() + seconds);
        Ok(())
    }

    /// Clears any expiration on `key`.
    pub fn persist(&self, key: &[u8]) {
        let _door = self.door.read();
        self.str_index.write().expires.remove(key);
    }

    /// Remaining whole seconds before `key` expires; 0 when the key has no
    /// expiration or is already expired.
    pub fn ttl(&self, key: &[u8]) -> u64 {
        let _door = self.door.read();

        let strs = self.str_index.upgradable_read();
        if past_deadline(&strs, key) {
            let mut strs = RwLockUpgradableReadGuard::upgrade(strs);
            self.remove_expired(&mut strs, key);
            return 0;
        }
        let Some(deadline) = strs.expires.deadline(key) else {
            return 0;
        };
        deadline.saturating_sub(now())
    }

    fn do_set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key_value(key, &[value])?;
        let _door = self.door.read();

        let mut strs = self.str_index.write();

        // Unchanged cached value: skip the append, still clear the TTL.
        if self.config.idx_mode == IdxMode::KeyValueRam && !past_deadline(&strs, key) {
            if let Some(existing) = strs.list.get(key) {
                if existing.value.as_deref() == Some(value) {
                    strs.expires.remove(key);
                    return Ok(());
                }
            }
        }

        let entry = Entry::no_extra(
            DataType::String,
            StrMark::Set as u16,
            key.to_vec(),
            value.to_vec(),
        );
        let at = self.store(&entry)?;
        apply_string_entry(self.config.idx_mode, &mut strs, &entry, at.file_id, at.offset)?;
        strs.expires.remove(key);
        Ok(())
    }

    /// Drops an expired key from the expiration map and the skip list, and
    /// appends the remove entry that makes recovery agree.
    fn remove_expired(&self, strs: &mut StrIndex, key: &[u8]) {
        strs.expires.remove(key);
        if strs.list.remove(key).is_some() {
            let entry = Entry::no_extra(
                DataType::String,
                StrMark::Remove as u16,
                key.to_vec(),
                Vec::new(),
            );
            if let Err(e) = self.store(&entry) {
                warn!(error = %e, "failed to log removal of expired key");
            }
        }
    }
}
