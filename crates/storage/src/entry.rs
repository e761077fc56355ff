//! Entry framing: the self-describing record appended to segment files.

use byteorder::{ByteOrder, LittleEndian};

use crate::{Error, Result};

/// Fixed byte length of the entry header.
pub const ENTRY_HEADER_SIZE: usize = 20;

/// The five value categories an entry can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DataType {
    String = 0,
    List = 1,
    Hash = 2,
    Set = 3,
    ZSet = 4,
}

impl TryFrom<u16> for DataType {
    type Error = Error;

    fn try_from(tag: u16) -> Result<Self> {
        match tag {
            0 => Ok(DataType::String),
            1 => Ok(DataType::List),
            2 => Ok(DataType::Hash),
            3 => Ok(DataType::Set),
            4 => Ok(DataType::ZSet),
            other => Err(Error::CorruptEntry(format!("unknown data type tag {other}"))),
        }
    }
}

/// Operation codes for String entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StrMark {
    Set = 0,
    Remove = 1,
}

/// Operation codes for List entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ListMark {
    LPush = 0,
    RPush = 1,
    LPop = 2,
    RPop = 3,
    LRem = 4,
    LInsert = 5,
    LSet = 6,
    LTrim = 7,
}

/// Operation codes for Hash entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum HashMark {
    HSet = 0,
    HDel = 1,
}

/// Operation codes for Set entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SetMark {
    SAdd = 0,
    SRem = 1,
    SMove = 2,
}

/// Operation codes for ZSet entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ZSetMark {
    ZAdd = 0,
    ZRem = 1,
}

macro_rules! mark_try_from {
    ($mark:ident, $type_name:literal, [$($variant:ident = $tag:literal),+ $(,)?]) => {
        impl TryFrom<u16> for $mark {
            type Error = Error;

            fn try_from(tag: u16) -> Result<Self> {
                match tag {
                    $($tag => Ok($mark::$variant),)+
                    other => Err(Error::CorruptEntry(format!(
                        concat!("unknown ", $type_name, " mark {}"),
                        other
                    ))),
                }
            }
        }
    };
}

mark_try_from!(StrMark, "String", [Set = 0, Remove = 1]);
mark_try_from!(
    ListMark,
    "List",
    [
        LPush = 0,
        RPush = 1,
        LPop = 2,
        RPop = 3,
        LRem = 4,
        LInsert = 5,
        LSet = 6,
        LTrim = 7,
    ]
);
mark_try_from!(HashMark, "Hash", [HSet = 0, HDel = 1]);
mark_try_from!(SetMark, "Set", [SAdd = 0, SRem = 1, SMove = 2]);
mark_try_from!(ZSetMark, "ZSet", [ZAdd = 0, ZRem = 1]);

/// The maximum valid mark tag for a given type, used to reject garbage
/// headers at decode time.
fn max_mark(data_type: DataType) -> u16 {
    match data_type {
        DataType::String => StrMark::Remove as u16,
        DataType::List => ListMark::LTrim as u16,
        DataType::Hash => HashMark::HDel as u16,
        DataType::Set => SetMark::SMove as u16,
        DataType::ZSet => ZSetMark::ZRem as u16,
    }
}

/// One framed mutation record.
///
/// `key` is never empty for a valid entry. `value` may be empty (delete and
/// pop marks). `extra` carries the operation argument that is neither key
/// nor value: a hash field, an LRem count, an LInsert pivot plus direction,
/// an LTrim range, an SMove destination, a ZAdd score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub data_type: DataType,
    pub mark: u16,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub extra: Vec<u8>,
}

struct Header {
    crc: u32,
    key_size: u32,
    value_size: u32,
    extra_size: u32,
    type_tag: u16,
    mark: u16,
}

fn parse_header(buf: &[u8]) -> Header {
    Header {
        crc: LittleEndian::read_u32(&buf[0..4]),
        key_size: LittleEndian::read_u32(&buf[4..8]),
        value_size: LittleEndian::read_u32(&buf[8..12]),
        extra_size: LittleEndian::read_u32(&buf[12..16]),
        type_tag: LittleEndian::read_u16(&buf[16..18]),
        mark: LittleEndian::read_u16(&buf[18..20]),
    }
}

impl Entry {
    /// Builds an entry with an extra argument.
    pub fn new(
        data_type: DataType,
        mark: u16,
        key: Vec<u8>,
        value: Vec<u8>,
        extra: Vec<u8>,
    ) -> Self {
        Self {
            data_type,
            mark,
            key,
            value,
            extra,
        }
    }

    /// Builds an entry with no extra argument.
    pub fn no_extra(data_type: DataType, mark: u16, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self::new(data_type, mark, key, value, Vec::new())
    }

    /// Total encoded length: header plus the three payload sections.
    pub fn size(&self) -> u64 {
        (ENTRY_HEADER_SIZE + self.key.len() + self.value.len() + self.extra.len()) as u64
    }

    /// Encodes the entry into its on-disk frame. Deterministic: the same
    /// entry always yields the same bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.size() as usize];

        LittleEndian::write_u32(&mut buf[0..4], crc32fast::hash(&self.value));
        LittleEndian::write_u32(&mut buf[4..8], self.key.len() as u32);
        LittleEndian::write_u32(&mut buf[8..12], self.value.len() as u32);
        LittleEndian::write_u32(&mut buf[12..16], self.extra.len() as u32);
        LittleEndian::write_u16(&mut buf[16..18], self.data_type as u16);
        LittleEndian::write_u16(&mut buf[18..20], self.mark);

        let mut at = ENTRY_HEADER_SIZE;
        buf[at..at + self.key.len()].copy_from_slice(&self.key);
        at += self.key.len();
        buf[at..at + self.value.len()].copy_from_slice(&self.value);
        at += self.value.len();
        buf[at..at + self.extra.len()].copy_from_slice(&self.extra);

        buf
    }

    /// Decodes one entry from the front of `buf`.
    ///
    /// # Termination
    ///
    /// - Fewer than [`ENTRY_HEADER_SIZE`] bytes remain, or the decoded key
    ///   size is zero (the zero-filled tail of a mapped segment) ->
    ///   [`Error::Eof`].
    /// - Payload extends past `buf` -> [`Error::CorruptEntry`].
    /// - CRC over the value bytes does not match -> [`Error::CorruptEntry`].
    pub fn decode(buf: &[u8]) -> Result<Entry> {
        if buf.len() < ENTRY_HEADER_SIZE {
            return Err(Error::Eof);
        }
        let header = parse_header(&buf[..ENTRY_HEADER_SIZE]);
        if header.key_size == 0 {
            return Err(Error::Eof);
        }

        let payload_len =
            header.key_size as usize + header.value_size as usize + header.extra_size as usize;
        let total = ENTRY_HEADER_SIZE + payload_len;
        if buf.len() < total {
            return Err(Error::CorruptEntry(format!(
                "truncated payload: need {payload_len} bytes after header"
            )));
        }

        Entry::from_parts(&header, &buf[ENTRY_HEADER_SIZE..total])
    }

    /// Assembles and validates an entry from a parsed header and its payload
    /// bytes (`key | value | extra`, exactly as framed).
    fn from_parts(header: &Header, payload: &[u8]) -> Result<Entry> {
        let data_type = DataType::try_from(header.type_tag)?;
        if header.mark > max_mark(data_type) {
            return Err(Error::CorruptEntry(format!(
                "unknown {data_type:?} mark {}",
                header.mark
            )));
        }

        let key_end = header.key_size as usize;
        let value_end = key_end + header.value_size as usize;
        let value = payload[key_end..value_end].to_vec();

        let actual = crc32fast::hash(&value);
        if actual != header.crc {
            return Err(Error::CorruptEntry(format!(
                "crc mismatch: header {:#010x}, payload {:#010x}",
                header.crc, actual
            )));
        }

        Ok(Entry {
            data_type,
            mark: header.mark,
            key: payload[..key_end].to_vec(),
            value,
            extra: payload[value_end..].to_vec(),
        })
    }

    /// Decode path for positional file I/O: the header has already been read
    /// into a fixed buffer and the payload fetched separately.
    pub(crate) fn decode_split(header_buf: &[u8], payload: &[u8]) -> Result<Entry> {
        let header = parse_header(header_buf);
        Entry::from_parts(&header, payload)
    }

    /// Parses just the sizes out of a header buffer, returning
    /// `(payload_len, key_size)`. Used by the file-I/O read path to size the
    /// payload read before decoding.
    pub(crate) fn payload_len(header_buf: &[u8]) -> (usize, u32) {
        let header = parse_header(header_buf);
        (
            header.key_size as usize + header.value_size as usize + header.extra_size as usize,
            header.key_size,
        )
    }
}
