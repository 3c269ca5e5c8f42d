//! CP/M directory entry decoding.
//!
//! Layout (32 bytes):
//! - Byte 0: User number (0xE5 = deleted)
//! - Bytes 1-8: Filename (space-padded, high bits = f1-f8 flags)
//! - Bytes 9-11: Extension (high bits = W, S, A attributes)
//! - Byte 12: Extent number (EX)
//! - Bytes 13-14: Reserved (S1, S2)
//! - Byte 15: Record count (RC)
//! - Bytes 16-31: Allocation blocks (zero-terminated)

use bitflags::bitflags;
use serde::Serialize;

/// Size of a directory entry in bytes.
pub const DIR_ENTRY_SIZE: usize = 32;

/// Records an extent holds when full.
pub const MAX_EXTENT_RECORDS: usize = 128;

/// User byte marking a deleted or never-used entry.
pub const DELETED_USER: u8 = 0xE5;

bitflags! {
    /// Attribute bits stored in the high bit of each extension byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CpmAttributes: u8 {
        /// t1'
        const WRITE_PROTECT = 0b001;
        /// t2'
        const SYSTEM = 0b010;
        /// t3'
        const ARCHIVE = 0b100;
    }
}

impl CpmAttributes {
    fn from_extension(ext: &[u8]) -> Self {
        let mut bits = 0u8;
        for (i, b) in ext.iter().enumerate() {
            if b & 0x80 != 0 {
                bits |= 1 << i;
            }
        }
        Self::from_bits_truncate(bits)
    }

    /// Fixed-width `WSA` text with blanks for clear bits.
    pub fn to_text(self) -> String {
        [
            (Self::WRITE_PROTECT, 'W'),
            (Self::SYSTEM, 'S'),
            (Self::ARCHIVE, 'A'),
        ]
        .iter()
        .map(|&(flag, ch)| if self.contains(flag) { ch } else { ' ' })
        .collect()
    }
}

/// What a directory slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Normal,
    Deleted,
    /// Non-printable name: label, timestamp or garbage
    Special,
}

/// One decoded 32-byte directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpmDirEntry {
    /// Position in the directory
    pub slot: usize,
    pub user: u8,
    /// Name bytes with high bits stripped
    pub raw_name: [u8; 8],
    /// Extension bytes with high bits stripped
    pub raw_ext: [u8; 3],
    /// f1-f8 flags (bit n = name byte n)
    pub name_flags: u8,
    pub attributes: CpmAttributes,
    pub extent: u8,
    pub s1: u8,
    pub s2: u8,
    pub record_count: u8,
    /// Allocated blocks up to the first zero
    pub blocks: Vec<u8>,
}

impl CpmDirEntry {
    /// Decode an entry. Returns None if `bytes` is shorter than an entry.
    pub fn parse(slot: usize, bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..DIR_ENTRY_SIZE)?;

        let mut raw_name = [0u8; 8];
        let mut name_flags = 0u8;
        for (i, &b) in bytes[1..9].iter().enumerate() {
            raw_name[i] = b & 0x7F;
            if b & 0x80 != 0 {
                name_flags |= 1 << i;
            }
        }

        let mut raw_ext = [0u8; 3];
        for (i, &b) in bytes[9..12].iter().enumerate() {
            raw_ext[i] = b & 0x7F;
        }

        let blocks = bytes[16..32]
            .iter()
            .copied()
            .take_while(|&b| b != 0)
            .collect();

        Some(Self {
            slot,
            user: bytes[0],
            raw_name,
            raw_ext,
            name_flags,
            attributes: CpmAttributes::from_extension(&bytes[9..12]),
            extent: bytes[12],
            s1: bytes[13],
            s2: bytes[14],
            record_count: bytes[15],
            blocks,
        })
    }

    /// Decode every entry in a directory region.
    pub fn parse_all(directory: &[u8]) -> Vec<Self> {
        directory
            .chunks_exact(DIR_ENTRY_SIZE)
            .enumerate()
            .filter_map(|(slot, chunk)| Self::parse(slot, chunk))
            .collect()
    }

    pub fn kind(&self) -> EntryKind {
        if self.user == DELETED_USER {
            EntryKind::Deleted
        } else if !is_printable(self.raw_name[0]) {
            EntryKind::Special
        } else {
            EntryKind::Normal
        }
    }

    pub fn is_normal(&self) -> bool {
        self.kind() == EntryKind::Normal
    }

    /// Filename (trimmed).
    pub fn name(&self) -> String {
        field_text(&self.raw_name)
    }

    /// Extension (trimmed).
    pub fn extension(&self) -> String {
        field_text(&self.raw_ext)
    }

    /// Full filename with extension.
    pub fn filename(&self) -> String {
        let name = self.name();
        let ext = self.extension();
        if ext.is_empty() {
            name
        } else {
            format!("{}.{}", name, ext)
        }
    }

    /// Does this entry belong to the given file (case-insensitive)?
    pub fn matches(&self, user: u8, name: &str, ext: &str) -> bool {
        self.user == user
            && self.name().eq_ignore_ascii_case(name.trim())
            && self.extension().eq_ignore_ascii_case(ext.trim())
    }

    /// f1-f8 flags as digits, blank where clear (e.g. `"1      8"`).
    pub fn name_flags_text(&self) -> String {
        (0..8)
            .map(|i| {
                if self.name_flags & (1 << i) != 0 {
                    char::from(b'1' + i)
                } else {
                    ' '
                }
            })
            .collect()
    }

    /// Is this the last extent of its file?
    ///
    /// Only a partially filled extent is recognised as last; a file whose final
    /// extent is exactly full looks unfinished.
    pub fn is_last_extent(&self) -> bool {
        (self.record_count as usize) < MAX_EXTENT_RECORDS
    }
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b)
}

fn field_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}
