//! # Engine — LagoonKV Storage Engine
//!
//! An embeddable, single-process, Redis-flavored key-value store. Five
//! value categories — string, list, hash, set, sorted set — share one
//! persistence substrate: a segmented append-only log (the [`storage`]
//! crate) indexed by a byte-ordered skip list for strings (the [`index`]
//! crate) and per-type in-memory structures for the composites (the
//! [`datatypes`] crate).
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Db                                │
//! │                                                              │
//! │ write op: validate → build Entry → append to active segment  │
//! │           (rotate on overflow, fsync if Sync) → apply to the │
//! │           per-type in-memory index                           │
//! │                                                              │
//! │ read op:  consult index; under KeyOnlyRam fetch the value    │
//! │           from the owning segment at the recorded offset     │
//! │                                                              │
//! │ recovery: replay every segment in id order through the same  │
//! │           builders the write path uses                       │
//! │                                                              │
//! │ reclaim:  rewrite live entries into a fresh segment set      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module       | Purpose                                             |
//! |--------------|-----------------------------------------------------|
//! | `lib.rs`     | `Db` struct, open/reopen/close/sync, log rotation   |
//! | [`config`]   | Recognized options and defaults                     |
//! | [`error`]    | The error taxonomy                                  |
//! | `strings`    | String operations, TTLs, prefix/range scans         |
//! | `lists`      | List operations                                     |
//! | `hashes`     | Hash operations                                     |
//! | `sets`       | Set operations                                      |
//! | `zsets`      | Sorted-set operations                               |
//! | `recovery`   | Index reconstruction by log replay                  |
//! | `reclaim`    | Log compaction and the per-type liveness predicate  |
//!
//! ## Concurrency
//!
//! A coarse reader/writer lock guards open/close and reclamation
//! (reclamation is exclusive); every operation holds it for read. Each of
//! the five type indexes sits behind its own `parking_lot::RwLock`, taken
//! for write across the whole validate → append → apply sequence so the
//! log order always matches the index-application order for that type.
//! The String lock also covers the expiration map. The log state has its
//! own lock, always acquired after a type lock; no operation takes two
//! type locks, so there is no ordering concern.
//!
//! ## Durability
//!
//! The log is the only source of truth: every accepted mutation is
//! appended before the in-memory index is updated, and a write is durable
//! after the next successful sync (every append when `Sync` is on). At
//! close the engine persists three sidecars next to the segments: the
//! serialized config (`db.cfg`), the active write offset (`db.meta`) and
//! the expiration map (`db.expires`).

pub mod config;
pub mod error;

mod hashes;
mod lists;
mod reclaim;
mod recovery;
mod sets;
mod strings;
mod zsets;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::{debug, warn};

use datatypes::{Hash, List, Set, SortedSet};
use index::{Indexer, SkipList};
use storage::{Entry, Expires, Meta, Segment, ENTRY_HEADER_SIZE};

pub use config::{Config, IdxMode};
pub use datatypes::InsertOption;
pub use error::{Error, Result};
pub use storage::RwMethod;

/// Serialized config, written at close.
pub const CONFIG_FILE_NAME: &str = "db.cfg";
/// Meta sidecar holding the active write offset.
pub const META_FILE_NAME: &str = "db.meta";
/// Persisted expiration map.
pub const EXPIRES_FILE_NAME: &str = "db.expires";
/// Transient scratch directory used during reclamation.
pub const RECLAIM_DIR_NAME: &str = "rosedb_reclaim";

/// Reserved separator joining the pieces of a composite extra. User
/// arguments that end up inside such an extra must not contain it.
pub(crate) const EXTRA_SEPARATOR: &[u8] = b"\\0";

/// The segment set plus its bookkeeping, guarded by one lock so appends
/// arriving under different type locks serialize.
pub(crate) struct LogState {
    active: Segment,
    active_id: u32,
    archived: BTreeMap<u32, Segment>,
    meta: Meta,
}

/// Where `store` placed an entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StoredAt {
    pub file_id: u32,
    pub offset: u64,
}

impl LogState {
    /// Appends `entry` to the active segment, rotating first when the
    /// entry would overflow it, and syncing when the config asks for it.
    pub(crate) fn store(&mut self, config: &Config, entry: &Entry) -> Result<StoredAt> {
        if self.active.offset() + entry.size() > config.block_size {
            self.active.sync()?;

            let next_id = self.active_id + 1;
            let fresh = Segment::open(
                &config.dir_path,
                next_id,
                config.rw_method,
                config.block_size,
            )?;
            let sealed = std::mem::replace(&mut self.active, fresh);
            debug!(sealed = sealed.id(), active = next_id, "rotated segment");
            self.archived.insert(sealed.id(), sealed);
            self.active_id = next_id;
            self.meta.active_write_off = 0;
        }

        let offset = self.active.write(entry)?;
        self.meta.active_write_off = self.active.offset();

        if config.sync {
            self.active.sync()?;
        }

        Ok(StoredAt {
            file_id: self.active_id,
            offset,
        })
    }

    /// Reads the entry an indexer points at.
    pub(crate) fn read_entry(&self, file_id: u32, offset: u64) -> Result<Entry> {
        let segment = if file_id == self.active_id {
            &self.active
        } else {
            self.archived
                .get(&file_id)
                .ok_or(Error::SegmentMissing(file_id))?
        };
        Ok(segment.read(offset)?)
    }
}

/// The String index: skip list plus the expiration map it covers.
pub(crate) struct StrIndex {
    pub(crate) list: SkipList,
    pub(crate) expires: Expires,
}

/// A LagoonKV database instance.
///
/// All operations take `&self`; the instance is safe to share across
/// threads. Within one type, externally observed effects match the serial
/// order of accepted calls.
pub struct Db {
    config: Config,
    /// Coarse lock: operations hold it for read, close and reclamation for
    /// write.
    door: RwLock<()>,
    log: RwLock<LogState>,
    str_index: RwLock<StrIndex>,
    list_index: RwLock<List>,
    hash_index: RwLock<Hash>,
    set_index: RwLock<Set>,
    zset_index: RwLock<SortedSet>,
}

impl Db {
    /// Opens (or creates) a database under `config.dir_path`, replaying
    /// every segment to rebuild the in-memory indexes.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when `block_size` cannot hold a maximal
    /// entry; [`Error::CorruptLog`] when replay hits a non-EOF decode
    /// error; I/O errors from the underlying file system.
    pub fn open(config: Config) -> Result<Db> {
        validate_config(&config)?;
        fs::create_dir_all(&config.dir_path)?;

        let (archived, active_id) =
            storage::build(&config.dir_path, config.rw_method, config.block_size)?;
        let mut active = Segment::open(
            &config.dir_path,
            active_id,
            config.rw_method,
            config.block_size,
        )?;

        let mut meta = Meta::load(&config.dir_path.join(META_FILE_NAME));
        let expires = Expires::load(&config.dir_path.join(EXPIRES_FILE_NAME));

        let mut indexes = recovery::Indexes::new(expires);
        let scanned_end =
            recovery::load_indexes(&config, &archived, &active, active_id, &mut indexes)?;

        // Trust what replay proved is on disk over a possibly stale meta
        // record (a crash skips the close-time meta save).
        let write_off = scanned_end.max(meta.active_write_off);
        active.set_offset(write_off);
        meta.active_write_off = write_off;

        debug!(
            archived = archived.len(),
            active = active_id,
            write_off,
            string_keys = indexes.strs.list.len(),
            "opened database"
        );

        Ok(Db {
            config,
            door: RwLock::new(()),
            log: RwLock::new(LogState {
                active,
                active_id,
                archived,
                meta,
            }),
            str_index: RwLock::new(indexes.strs),
            list_index: RwLock::new(indexes.lists),
            hash_index: RwLock::new(indexes.hashes),
            set_index: RwLock::new(indexes.sets),
            zset_index: RwLock::new(indexes.zsets),
        })
    }

    /// Reopens a directory using the config saved at its last close.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigNotFound`] when the directory has no `db.cfg`.
    pub fn reopen(dir: &Path) -> Result<Db> {
        let cfg_path = dir.join(CONFIG_FILE_NAME);
        if !cfg_path.exists() {
            return Err(Error::ConfigNotFound(dir.to_path_buf()));
        }

        let bytes = fs::read(&cfg_path)?;
        let config: Config = serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidConfig(format!("unreadable {CONFIG_FILE_NAME}: {e}")))?;
        Db::open(config)
    }

    /// The configuration this instance runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of archived segments.
    pub fn archived_count(&self) -> usize {
        let _door = self.door.read();
        self.log.read().archived.len()
    }

    /// Id of the active segment.
    pub fn active_file_id(&self) -> u32 {
        let _door = self.door.read();
        self.log.read().active_id
    }

    /// Flushes the active segment to disk.
    pub fn sync(&self) -> Result<()> {
        let _door = self.door.read();
        self.log.read().active.sync()?;
        Ok(())
    }

    /// Persists the three sidecars (config, meta, expires) and syncs every
    /// segment. The instance remains usable; dropping it performs a
    /// best-effort close as well.
    pub fn close(&self) -> Result<()> {
        let _door = self.door.write();

        let cfg_bytes =
            serde_json::to_vec(&self.config).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        fs::write(self.config.dir_path.join(CONFIG_FILE_NAME), cfg_bytes)?;

        let log = self.log.read();
        log.meta.store(&self.config.dir_path.join(META_FILE_NAME))?;

        self.str_index
            .read()
            .expires
            .store(&self.config.dir_path.join(EXPIRES_FILE_NAME))?;

        for segment in log.archived.values() {
            segment.sync()?;
        }
        log.active.sync()?;
        Ok(())
    }

    // ---- shared plumbing for the per-type modules ----

    pub(crate) fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if key.len() > self.config.max_key_size as usize {
            return Err(Error::KeyTooLarge);
        }
        Ok(())
    }

    pub(crate) fn check_value(&self, value: &[u8]) -> Result<()> {
        if value.len() > self.config.max_value_size as usize {
            return Err(Error::ValueTooLarge);
        }
        Ok(())
    }

    pub(crate) fn check_key_value(&self, key: &[u8], values: &[&[u8]]) -> Result<()> {
        self.check_key(key)?;
        for value in values {
            self.check_value(value)?;
        }
        Ok(())
    }

    /// Appends `entry` under the log lock.
    pub(crate) fn store(&self, entry: &Entry) -> Result<StoredAt> {
        self.log.write().store(&self.config, entry)
    }

    /// Resolves an indexer to its value bytes: the cached copy in
    /// key-value mode, a segment read in key-only mode.
    pub(crate) fn value_of(&self, indexer: &Indexer) -> Result<Vec<u8>> {
        if let Some(value) = &indexer.value {
            return Ok(value.clone());
        }
        let log = self.log.read();
        let entry = log.read_entry(indexer.file_id, indexer.offset)?;
        if entry.key != indexer.key {
            return Err(Error::Storage(storage::Error::CorruptEntry(format!(
                "segment {} offset {} holds a different key",
                indexer.file_id, indexer.offset
            ))));
        }
        Ok(entry.value)
    }
}

impl Drop for Db {
    /// Best-effort close. Errors are logged and swallowed: the log already
    /// holds every accepted mutation, so the next open replays to the same
    /// state even when a sidecar save fails here.
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "close on drop failed");
        }
    }
}

/// Seconds since the epoch.
pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn validate_config(config: &Config) -> Result<()> {
    if config.max_key_size == 0 {
        return Err(Error::InvalidConfig("max_key_size must be positive".into()));
    }

    // The largest entry the engine can emit: a maximal key and value plus
    // the largest extra (an LInsert pivot is value-sized, joined with the
    // separator and a direction digit). Every entry must fit a fresh
    // segment.
    let largest_extra = config.max_value_size as u64 + EXTRA_SEPARATOR.len() as u64 + 1;
    let largest_entry = ENTRY_HEADER_SIZE as u64
        + config.max_key_size as u64
        + config.max_value_size as u64
        + largest_extra;
    if config.block_size < largest_entry {
        return Err(Error::InvalidConfig(format!(
            "block_size {} cannot hold a maximal entry of {} bytes",
            config.block_size, largest_entry
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
