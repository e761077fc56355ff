//! Sidecar records persisted next to the segments: the meta record (active
//! write offset) and the expiration dictionary.
//!
//! Both are small JSON files rewritten whole at close. Saves go through a
//! temp file + rename so a crash mid-save never leaves a half-written
//! sidecar; loads treat a missing or unreadable file as the empty default.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Extra bookkeeping the engine needs across runs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Write offset of the active segment at the time of the last close.
    pub active_write_off: u64,
}

impl Meta {
    /// Loads the meta record, falling back to the default when the file is
    /// missing or unparseable.
    pub fn load(path: &Path) -> Meta {
        fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    /// Persists the meta record.
    pub fn store(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self).map_err(to_io)?;
        write_atomic(path, &bytes)
    }
}

/// The expiration dictionary: key bytes → absolute deadline in whole
/// seconds since the epoch.
#[derive(Debug, Default)]
pub struct Expires {
    map: HashMap<Vec<u8>, u64>,
}

impl Expires {
    /// Loads the dictionary, falling back to empty when the file is missing
    /// or unparseable.
    pub fn load(path: &Path) -> Expires {
        let map = fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Vec<(Vec<u8>, u64)>>(&bytes).ok())
            .map(|pairs| pairs.into_iter().collect())
            .unwrap_or_default();
        Expires { map }
    }

    /// Persists the dictionary.
    pub fn store(&self, path: &Path) -> Result<()> {
        // Keys are arbitrary bytes, so the on-disk form is a pair list
        // rather than a JSON object. Sorted so saves are deterministic.
        let mut pairs: Vec<(&[u8], u64)> = self
            .map
            .iter()
            .map(|(key, deadline)| (key.as_slice(), *deadline))
            .collect();
        pairs.sort_unstable();

        let bytes = serde_json::to_vec(&pairs).map_err(to_io)?;
        write_atomic(path, &bytes)
    }

    /// Deadline recorded for `key`, if any.
    pub fn deadline(&self, key: &[u8]) -> Option<u64> {
        self.map.get(key).copied()
    }

    pub fn set(&mut self, key: Vec<u8>, deadline: u64) {
        self.map.insert(key, deadline);
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.map.remove(key);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn to_io(e: serde_json::Error) -> crate::Error {
    crate::Error::Io(io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => path.with_file_name(format!("{name}.tmp")),
        None => path.with_extension("tmp"),
    };
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
