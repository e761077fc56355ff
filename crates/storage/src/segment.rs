//! Segment files: capped append-only data files plus directory discovery.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use serde::{Deserialize, Serialize};

use crate::{Entry, Error, Result, ENTRY_HEADER_SIZE};

/// File extension for segment files.
pub const SEGMENT_FILE_EXT: &str = ".data";

/// Formats the file name for a segment id: zero-padded 9 digits + `.data`.
pub fn segment_file_name(id: u32) -> String {
    format!("{id:09}{SEGMENT_FILE_EXT}")
}

/// How segment bytes are read and written. The two methods are semantically
/// interchangeable; they differ only in performance and fault mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RwMethod {
    /// Standard positional file I/O.
    FileIo,
    /// Memory-mapped I/O. Capacity is allocated up front at creation, so
    /// the unwritten tail reads as zeroes.
    MemMap,
}

enum Backend {
    File(File),
    Mmap { file: File, map: MmapMut },
}

/// One append-only log file.
///
/// A segment is either *active* (the unique segment receiving appends) or
/// *archived* (sealed, read-only until reclamation). The distinction lives
/// in the engine; the segment itself just tracks its write offset and
/// enforces its capacity.
pub struct Segment {
    id: u32,
    path: PathBuf,
    capacity: u64,
    offset: u64,
    backend: Backend,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("offset", &self.offset)
            .finish()
    }
}

impl Segment {
    /// Creates or opens the segment file for `id` under `dir` with
    /// read/write access.
    ///
    /// Under [`RwMethod::MemMap`] the file is grown to `capacity` up front
    /// and mapped mutably; under [`RwMethod::FileIo`] it grows as entries
    /// are appended.
    pub fn open(dir: &Path, id: u32, method: RwMethod, capacity: u64) -> Result<Segment> {
        let path = dir.join(segment_file_name(id));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let backend = match method {
            RwMethod::FileIo => Backend::File(file),
            RwMethod::MemMap => {
                if file.metadata()?.len() < capacity {
                    file.set_len(capacity)?;
                }
                // Safety: the engine owns every handle to this file for the
                // lifetime of the database instance; single-process access
                // is a documented precondition of the store.
                let map = unsafe { MmapMut::map_mut(&file)? };
                Backend::Mmap { file, map }
            }
        };

        Ok(Segment {
            id,
            path,
            capacity,
            offset: 0,
            backend,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Current write offset: the byte position the next append lands at.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Repositions the write offset (used at open, from the meta sidecar).
    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// Encodes `entry` and appends it at the current write offset, returning
    /// the offset the entry starts at.
    ///
    /// Fails with [`Error::SegmentFull`] when the encoded entry would exceed
    /// capacity (the caller rotates to a fresh segment) and
    /// [`Error::EmptyEntry`] for an entry with an empty key.
    pub fn write(&mut self, entry: &Entry) -> Result<u64> {
        if entry.key.is_empty() {
            return Err(Error::EmptyEntry);
        }

        let buf = entry.encode();
        let size = buf.len() as u64;
        if self.offset + size > self.capacity {
            return Err(Error::SegmentFull {
                need: size,
                remaining: self.capacity - self.offset,
            });
        }

        let start = self.offset;
        match &mut self.backend {
            Backend::File(file) => file.write_all_at(&buf, start)?,
            Backend::Mmap { map, .. } => {
                map[start as usize..start as usize + buf.len()].copy_from_slice(&buf);
            }
        }
        self.offset += size;
        Ok(start)
    }

    /// Decodes the entry starting at `offset`.
    ///
    /// Returns [`Error::Eof`] when `offset` is at the end of the segment's
    /// data and [`Error::CorruptEntry`] on CRC failure or a truncated frame.
    pub fn read(&self, offset: u64) -> Result<Entry> {
        match &self.backend {
            Backend::File(file) => {
                let mut header = [0u8; ENTRY_HEADER_SIZE];
                read_exact_at(file, &mut header, offset)?;

                let (payload_len, key_size) = Entry::payload_len(&header);
                if key_size == 0 {
                    return Err(Error::Eof);
                }

                let mut payload = vec![0u8; payload_len];
                match read_exact_at(file, &mut payload, offset + ENTRY_HEADER_SIZE as u64) {
                    Ok(()) => {}
                    // Entries are never split across segments, so a frame
                    // that runs past the end of the file is corruption, not
                    // a clean end of data.
                    Err(Error::Eof) => {
                        return Err(Error::CorruptEntry(
                            "payload truncated at end of segment".to_string(),
                        ))
                    }
                    Err(e) => return Err(e),
                }

                Entry::decode_split(&header, &payload)
            }
            Backend::Mmap { map, .. } => {
                if offset as usize >= map.len() {
                    return Err(Error::Eof);
                }
                Entry::decode(&map[offset as usize..])
            }
        }
    }

    /// Flushes file buffers to disk; under memory-mapped I/O the mapping is
    /// flushed first. A write is durable once the next `sync` succeeds.
    pub fn sync(&self) -> Result<()> {
        match &self.backend {
            Backend::File(file) => file.sync_all()?,
            Backend::Mmap { file, map } => {
                map.flush()?;
                file.sync_all()?;
            }
        }
        Ok(())
    }
}

fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> Result<()> {
    match file.read_exact_at(buf, offset) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::Eof),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Scans `dir` for segment files and opens every one except the newest.
///
/// Returns the archived map (id → segment) and the active id = max id seen
/// (0 for an empty directory). The active segment is deliberately *not*
/// opened here: the engine opens it separately and positions it at the
/// offset recorded in the meta sidecar.
pub fn build(
    dir: &Path,
    method: RwMethod,
    capacity: u64,
) -> Result<(BTreeMap<u32, Segment>, u32)> {
    let mut ids: Vec<u32> = Vec::new();
    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        let name = dirent.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(SEGMENT_FILE_EXT) else {
            continue;
        };
        if let Ok(id) = stem.parse::<u32>() {
            ids.push(id);
        }
    }
    ids.sort_unstable();

    let active_id = ids.last().copied().unwrap_or(0);
    let mut archived = BTreeMap::new();
    for id in ids {
        if id != active_id {
            archived.insert(id, Segment::open(dir, id, method, capacity)?);
        }
    }
    Ok((archived, active_id))
}
