//! List operations.
//!
//! List marks are not commutative, so replay applies every one of them in
//! log order through [`apply_list_entry`] — the same routine the write
//! path uses after appending. Operations whose acceptance depends on the
//! current list (pops, removes, inserts, sets, trims) decide read-only
//! first, then append, then mutate, so the log never carries a rejected
//! mutation.

use datatypes::{InsertOption, List};
use storage::{DataType, Entry, ListMark};

use crate::{Db, Error, Result, EXTRA_SEPARATOR};

/// Applies a List entry to the index. Shared by the write path and replay.
pub(crate) fn apply_list_entry(list: &mut List, entry: &Entry) -> Result<()> {
    match ListMark::try_from(entry.mark)? {
        ListMark::LPush => {
            list.lpush(&entry.key, entry.value.clone());
        }
        ListMark::RPush => {
            list.rpush(&entry.key, entry.value.clone());
        }
        ListMark::LPop => {
            list.lpop(&entry.key);
        }
        ListMark::RPop => {
            list.rpop(&entry.key);
        }
        ListMark::LRem => {
            let count = parse_i64(&entry.extra)?;
            list.lrem(&entry.key, &entry.value, count);
        }
        ListMark::LInsert => {
            let (pivot, code) = split_extra(&entry.extra)?;
            let option = InsertOption::try_from(parse_i64(code)? as u8)
                .map_err(|_| corrupt("unknown linsert direction"))?;
            list.linsert(&entry.key, option, pivot, entry.value.clone());
        }
        ListMark::LSet => {
            let index = parse_i64(&entry.extra)?;
            list.lset(&entry.key, index, entry.value.clone());
        }
        ListMark::LTrim => {
            let (start, end) = split_extra(&entry.extra)?;
            list.ltrim(&entry.key, parse_i64(start)?, parse_i64(end)?);
        }
    }
    Ok(())
}

impl Db {
    /// Pushes `values` at the head, left to right. Returns the new length.
    pub fn lpush(&self, key: &[u8], values: &[&[u8]]) -> Result<usize> {
        self.check_key_value(key, values)?;
        let _door = self.door.read();

        let mut lists = self.list_index.write();
        for value in values {
            let entry = Entry::no_extra(
                DataType::List,
                ListMark::LPush as u16,
                key.to_vec(),
                value.to_vec(),
            );
            self.store(&entry)?;
            apply_list_entry(&mut lists, &entry)?;
        }
        Ok(lists.llen(key))
    }

    /// Pushes `values` at the tail, left to right. Returns the new length.
    pub fn rpush(&self, key: &[u8], values: &[&[u8]]) -> Result<usize> {
        self.check_key_value(key, values)?;
        let _door = self.door.read();

        let mut lists = self.list_index.write();
        for value in values {
            let entry = Entry::no_extra(
                DataType::List,
                ListMark::RPush as u16,
                key.to_vec(),
                value.to_vec(),
            );
            self.store(&entry)?;
            apply_list_entry(&mut lists, &entry)?;
        }
        Ok(lists.llen(key))
    }

    /// Removes and returns the head element.
    pub fn lpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_key(key)?;
        let _door = self.door.read();

        let mut lists = self.list_index.write();
        let Some(value) = lists.front(key).map(<[u8]>::to_vec) else {
            return Ok(None);
        };

        let entry = Entry::no_extra(
            DataType::List,
            ListMark::LPop as u16,
            key.to_vec(),
            value.clone(),
        );
        self.store(&entry)?;
        apply_list_entry(&mut lists, &entry)?;
        Ok(Some(value))
    }

    /// Removes and returns the tail element.
    pub fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_key(key)?;
        let _door = self.door.read();

        let mut lists = self.list_index.write();
        let Some(value) = lists.back(key).map(<[u8]>::to_vec) else {
            return Ok(None);
        };

        let entry = Entry::no_extra(
            DataType::List,
            ListMark::RPop as u16,
            key.to_vec(),
            value.clone(),
        );
        self.store(&entry)?;
        apply_list_entry(&mut lists, &entry)?;
        Ok(Some(value))
    }

    /// Element at `index`; negative indices count from the tail.
    pub fn lindex(&self, key: &[u8], index: i64) -> Option<Vec<u8>> {
        let _door = self.door.read();
        self.list_index.read().lindex(key, index).map(<[u8]>::to_vec)
    }

    /// Removes elements equal to `value` per the count rules (`> 0` from
    /// the head, `< 0` from the tail, `0` all). Returns the number removed.
    pub fn lrem(&self, key: &[u8], value: &[u8], count: i64) -> Result<usize> {
        self.check_key_value(key, &[value])?;
        let _door = self.door.read();

        let mut lists = self.list_index.write();
        let removed = lists.lrem_count(key, value, count);
        if removed == 0 {
            return Ok(0);
        }

        let entry = Entry::new(
            DataType::List,
            ListMark::LRem as u16,
            key.to_vec(),
            value.to_vec(),
            count.to_string().into_bytes(),
        );
        self.store(&entry)?;
        apply_list_entry(&mut lists, &entry)?;
        Ok(removed)
    }

    /// Inserts `value` before or after the first occurrence of `pivot`.
    /// Returns the new length, or -1 when the pivot is not in the list.
    ///
    /// # Errors
    ///
    /// [`Error::ExtraContainsSeparator`] when `pivot` contains the
    /// reserved `\0` token.
    pub fn linsert(
        &self,
        key: &[u8],
        option: InsertOption,
        pivot: &[u8],
        value: &[u8],
    ) -> Result<i64> {
        self.check_key_value(key, &[value])?;
        if contains_separator(pivot) {
            return Err(Error::ExtraContainsSeparator);
        }
        let _door = self.door.read();

        let mut lists = self.list_index.write();
        if !lists.contains(key, pivot) {
            return Ok(-1);
        }

        let mut extra = pivot.to_vec();
        extra.extend_from_slice(EXTRA_SEPARATOR);
        extra.extend_from_slice((option as u8).to_string().as_bytes());

        let entry = Entry::new(
            DataType::List,
            ListMark::LInsert as u16,
            key.to_vec(),
            value.to_vec(),
            extra,
        );
        self.store(&entry)?;
        apply_list_entry(&mut lists, &entry)?;
        Ok(lists.llen(key) as i64)
    }

    /// Replaces the element at `index`. Returns false when out of range.
    pub fn lset(&self, key: &[u8], index: i64, value: &[u8]) -> Result<bool> {
        self.check_key_value(key, &[value])?;
        let _door = self.door.read();

        let mut lists = self.list_index.write();
        if !lists.valid_index(key, index) {
            return Ok(false);
        }

        let entry = Entry::new(
            DataType::List,
            ListMark::LSet as u16,
            key.to_vec(),
            value.to_vec(),
            index.to_string().into_bytes(),
        );
        self.store(&entry)?;
        apply_list_entry(&mut lists, &entry)?;
        Ok(true)
    }

    /// Keeps only `[start, end]` inclusive (negatives count from the tail);
    /// an empty selection removes the key.
    pub fn ltrim(&self, key: &[u8], start: i64, end: i64) -> Result<()> {
        self.check_key(key)?;
        let _door = self.door.read();

        let mut lists = self.list_index.write();
        if !lists.ltrim_changes(key, start, end) {
            return Ok(());
        }

        let mut extra = start.to_string().into_bytes();
        extra.extend_from_slice(EXTRA_SEPARATOR);
        extra.extend_from_slice(end.to_string().as_bytes());

        let entry = Entry::new(
            DataType::List,
            ListMark::LTrim as u16,
            key.to_vec(),
            Vec::new(),
            extra,
        );
        self.store(&entry)?;
        apply_list_entry(&mut lists, &entry)?;
        Ok(())
    }

    /// Elements in `[start, end]` inclusive, normalized and clipped.
    pub fn lrange(&self, key: &[u8], start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
        self.check_key(key)?;
        let _door = self.door.read();
        Ok(self.list_index.read().lrange(key, start, end))
    }

    /// Length of the list at `key`.
    pub fn llen(&self, key: &[u8]) -> usize {
        let _door = self.door.read();
        self.list_index.read().llen(key)
    }
}

fn contains_separator(bytes: &[u8]) -> bool {
    bytes
        .windows(EXTRA_SEPARATOR.len())
        .any(|w| w == EXTRA_SEPARATOR)
}

fn split_extra(extra: &[u8]) -> Result<(&[u8], &[u8])> {
    let at = extra
        .windows(EXTRA_SEPARATOR.len())
        .position(|w| w == EXTRA_SEPARATOR)
        .ok_or_else(|| corrupt("extra missing separator"))?;
    Ok((&extra[..at], &extra[at + EXTRA_SEPARATOR.len()..]))
}

fn parse_i64(bytes: &[u8]) -> Result<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| corrupt("non-numeric extra"))
}

fn corrupt(what: &str) -> Error {
    Error::Storage(storage::Error::CorruptEntry(what.to_string()))
}
