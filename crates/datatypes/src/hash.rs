//! Field → value mapping per user key.

use std::collections::HashMap;

/// `key → (field → value)`. Fields are unique and unordered.
#[derive(Debug, Default)]
pub struct Hash {
    record: HashMap<Vec<u8>, HashMap<Vec<u8>, Vec<u8>>>,
}

impl Hash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` to `value`, overwriting. Returns the field count after
    /// the set.
    pub fn hset(&mut self, key: &[u8], field: Vec<u8>, value: Vec<u8>) -> usize {
        let item = self.record.entry(key.to_vec()).or_default();
        item.insert(field, value);
        item.len()
    }

    /// Sets `field` only when absent; returns whether it was set.
    pub fn hset_nx(&mut self, key: &[u8], field: Vec<u8>, value: Vec<u8>) -> bool {
        let item = self.record.entry(key.to_vec()).or_default();
        if item.contains_key(&field) {
            return false;
        }
        item.insert(field, value);
        true
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Option<&[u8]> {
        self.record.get(key)?.get(field).map(Vec::as_slice)
    }

    /// Every field and value, interleaved `[field, value, field, value, ..]`.
    /// Order is unspecified.
    pub fn hget_all(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let Some(item) = self.record.get(key) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(item.len() * 2);
        for (field, value) in item {
            out.push(field.clone());
            out.push(value.clone());
        }
        out
    }

    /// Removes `field`; returns whether it was present.
    pub fn hdel(&mut self, key: &[u8], field: &[u8]) -> bool {
        self.record
            .get_mut(key)
            .is_some_and(|item| item.remove(field).is_some())
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> bool {
        self.record
            .get(key)
            .is_some_and(|item| item.contains_key(field))
    }

    pub fn hlen(&self, key: &[u8]) -> usize {
        self.record.get(key).map_or(0, HashMap::len)
    }

    pub fn hkeys(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.record
            .get(key)
            .map_or_else(Vec::new, |item| item.keys().cloned().collect())
    }

    pub fn hvalues(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.record
            .get(key)
            .map_or_else(Vec::new, |item| item.values().cloned().collect())
    }
}
