//! Score-ordered member sets per user key.

use std::collections::{BTreeSet, HashMap};

use crate::list::normalize_range;

/// An f64 score with a total order, so (score, member) pairs can key an
/// ordered container.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Score(f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct SortedRecord {
    /// member → score.
    dict: HashMap<Vec<u8>, f64>,
    /// (score, member), ascending; ties order by member bytes.
    ord: BTreeSet<(Score, Vec<u8>)>,
}

/// `key → (dict member→score, ordered (score, member) set)`. The dict
/// answers point lookups, the ordered half answers rank queries.
#[derive(Debug, Default)]
pub struct SortedSet {
    record: HashMap<Vec<u8>, SortedRecord>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `member` with `score`, replacing any previous score.
    pub fn zadd(&mut self, key: &[u8], score: f64, member: Vec<u8>) {
        let item = self.record.entry(key.to_vec()).or_default();
        if let Some(old) = item.dict.insert(member.clone(), score) {
            item.ord.remove(&(Score(old), member.clone()));
        }
        item.ord.insert((Score(score), member));
    }

    /// The score of `member`, if present.
    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Option<f64> {
        self.record.get(key)?.dict.get(member).copied()
    }

    pub fn zis_member(&self, key: &[u8], member: &[u8]) -> bool {
        self.record
            .get(key)
            .is_some_and(|item| item.dict.contains_key(member))
    }

    /// Removes `member`; returns whether it was present.
    pub fn zrem(&mut self, key: &[u8], member: &[u8]) -> bool {
        let Some(item) = self.record.get_mut(key) else {
            return false;
        };
        let Some(score) = item.dict.remove(member) else {
            return false;
        };
        item.ord.remove(&(Score(score), member.to_vec()));
        true
    }

    pub fn zcard(&self, key: &[u8]) -> usize {
        self.record.get(key).map_or(0, |item| item.dict.len())
    }

    /// Ascending rank of `member` (0-based), ordered by (score, member).
    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        let item = self.record.get(key)?;
        let score = *item.dict.get(member)?;
        item.ord
            .iter()
            .position(|(s, m)| *s == Score(score) && m.as_slice() == member)
    }

    /// Members in rank range `[start, end]` (inclusive, negative ranks count
    /// from the highest), with their scores, ascending.
    pub fn zrange(&self, key: &[u8], start: i64, end: i64) -> Vec<(Vec<u8>, f64)> {
        let Some(item) = self.record.get(key) else {
            return Vec::new();
        };
        match normalize_range(item.ord.len(), start, end) {
            None => Vec::new(),
            Some((s, e)) => item
                .ord
                .iter()
                .skip(s)
                .take(e - s + 1)
                .map(|(score, member)| (member.clone(), score.0))
                .collect(),
        }
    }
}
