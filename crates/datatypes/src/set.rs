//! Unordered member sets per user key.

use std::collections::{HashMap, HashSet};

use rand::seq::IteratorRandom;

/// `key → set of members`. Members are unique and unordered.
#[derive(Debug, Default)]
pub struct Set {
    record: HashMap<Vec<u8>, HashSet<Vec<u8>>>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `member`, returning the cardinality after the add.
    pub fn sadd(&mut self, key: &[u8], member: Vec<u8>) -> usize {
        let item = self.record.entry(key.to_vec()).or_default();
        item.insert(member);
        item.len()
    }

    pub fn sis_member(&self, key: &[u8], member: &[u8]) -> bool {
        self.record.get(key).is_some_and(|item| item.contains(member))
    }

    /// Up to `count` arbitrary members, without removing them. The pop path
    /// picks its victims here, logs them, then removes each.
    pub fn arbitrary_members(&self, key: &[u8], count: usize) -> Vec<Vec<u8>> {
        let Some(item) = self.record.get(key) else {
            return Vec::new();
        };
        let mut rng = rand::thread_rng();
        item.iter().choose_multiple(&mut rng, count).into_iter().cloned().collect()
    }

    /// `count > 0`: up to `count` distinct members. `count < 0`: `|count|`
    /// draws with replacement (members may repeat). `count == 0`: empty.
    pub fn srand_member(&self, key: &[u8], count: i64) -> Vec<Vec<u8>> {
        let Some(item) = self.record.get(key) else {
            return Vec::new();
        };
        if item.is_empty() || count == 0 {
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        if count > 0 {
            item.iter()
                .choose_multiple(&mut rng, count as usize)
                .into_iter()
                .cloned()
                .collect()
        } else {
            (0..count.unsigned_abs())
                .filter_map(|_| item.iter().choose(&mut rng).cloned())
                .collect()
        }
    }

    /// Removes `member`; returns whether it was present.
    pub fn srem(&mut self, key: &[u8], member: &[u8]) -> bool {
        self.record
            .get_mut(key)
            .is_some_and(|item| item.remove(member))
    }

    /// Moves `member` from `src` to `dst`. Returns false when `src` does
    /// not contain it.
    pub fn smove(&mut self, src: &[u8], dst: &[u8], member: &[u8]) -> bool {
        match self.record.get_mut(src) {
            Some(item) => {
                if !item.remove(member) {
                    return false;
                }
            }
            None => return false,
        }
        self.record
            .entry(dst.to_vec())
            .or_default()
            .insert(member.to_vec());
        true
    }

    pub fn scard(&self, key: &[u8]) -> usize {
        self.record.get(key).map_or(0, HashSet::len)
    }

    pub fn smembers(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.record
            .get(key)
            .map_or_else(Vec::new, |item| item.iter().cloned().collect())
    }

    /// Deduplicated union of the sets at `keys`.
    pub fn sunion(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut merged: HashSet<&Vec<u8>> = HashSet::new();
        for key in keys {
            if let Some(item) = self.record.get(*key) {
                merged.extend(item.iter());
            }
        }
        merged.into_iter().cloned().collect()
    }

    /// Members of `keys[0]` absent from every other key. Fewer than two
    /// keys yields nothing.
    pub fn sdiff(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        if keys.len() < 2 {
            return Vec::new();
        }
        let Some(first) = self.record.get(keys[0]) else {
            return Vec::new();
        };
        first
            .iter()
            .filter(|member| {
                !keys[1..]
                    .iter()
                    .any(|key| self.sis_member(key, member.as_slice()))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(members: &[&[u8]]) -> Set {
        let mut set = Set::new();
        for m in members {
            set.sadd(b"s", m.to_vec());
        }
        set
    }

    #[test]
    fn sadd_dedupes() {
        let mut set = Set::new();
        assert_eq!(set.sadd(b"s", b"x".to_vec()), 1);
        assert_eq!(set.sadd(b"s", b"x".to_vec()), 1);
        assert_eq!(set.sadd(b"s", b"y".to_vec()), 2);
        assert!(set.sis_member(b"s", b"x"));
        assert!(!set.sis_member(b"s", b"z"));
    }

    #[test]
    fn srem_reports_presence() {
        let mut set = seeded(&[b"x"]);
        assert!(set.srem(b"s", b"x"));
        assert!(!set.srem(b"s", b"x"));
        assert_eq!(set.scard(b"s"), 0);
    }

    #[test]
    fn smove_transfers_member() {
        let mut set = seeded(&[b"x", b"y"]);
        assert!(set.smove(b"s", b"t", b"x"));
        assert!(!set.sis_member(b"s", b"x"));
        assert!(set.sis_member(b"t", b"x"));
        // Absent member moves nothing.
        assert!(!set.smove(b"s", b"t", b"zz"));
    }

    #[test]
    fn arbitrary_members_bounded_by_card() {
        let set = seeded(&[b"a", b"b", b"c"]);
        assert_eq!(set.arbitrary_members(b"s", 2).len(), 2);
        assert_eq!(set.arbitrary_members(b"s", 10).len(), 3);
        assert!(set.arbitrary_members(b"missing", 2).is_empty());
    }

    #[test]
    fn srand_member_counts() {
        let set = seeded(&[b"a", b"b", b"c"]);

        // Positive count: unique members, clipped at cardinality.
        let unique = set.srand_member(b"s", 10);
        assert_eq!(unique.len(), 3);

        // Negative count: with replacement, exactly |count| draws.
        let drawn = set.srand_member(b"s", -7);
        assert_eq!(drawn.len(), 7);
        assert!(drawn.iter().all(|m| set.sis_member(b"s", m)));

        assert!(set.srand_member(b"s", 0).is_empty());
    }

    #[test]
    fn sunion_dedupes_across_keys() {
        let mut set = Set::new();
        set.sadd(b"a", b"1".to_vec());
        set.sadd(b"a", b"2".to_vec());
        set.sadd(b"b", b"2".to_vec());
        set.sadd(b"b", b"3".to_vec());

        let mut union = set.sunion(&[b"a", b"b"]);
        union.sort();
        assert_eq!(union, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn sdiff_subtracts_later_keys() {
        let mut set = Set::new();
        set.sadd(b"a", b"1".to_vec());
        set.sadd(b"a", b"2".to_vec());
        set.sadd(b"a", b"3".to_vec());
        set.sadd(b"b", b"2".to_vec());
        set.sadd(b"c", b"3".to_vec());

        let mut diff = set.sdiff(&[b"a", b"b", b"c"]);
        diff.sort();
        assert_eq!(diff, vec![b"1".to_vec()]);

        // Fewer than two keys yields nothing.
        assert!(set.sdiff(&[b"a"]).is_empty());
    }
}
