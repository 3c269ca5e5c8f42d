//! HDOS directory entries and their packed fields.
//!
//! Layout (23 bytes):
//! - Bytes 0-7: Filename (zero-padded; 0xFE/0xFF in byte 0 = unused)
//! - Bytes 8-10: Extension
//! - Byte 11: Project
//! - Byte 12: Version
//! - Byte 13: Cluster factor
//! - Byte 14: Flags
//! - Byte 15: Reserved
//! - Byte 16: First cluster
//! - Byte 17: Last cluster
//! - Byte 18: Sectors used in last cluster
//! - Bytes 19-20: Create date
//! - Bytes 21-22: Modify date

use std::fmt;

use bitflags::bitflags;

/// Size of a directory entry in bytes.
pub const HDOS_ENTRY_SIZE: usize = 23;

/// Entries in one 512-byte directory block.
pub const ENTRIES_PER_BLOCK: usize = 22;

/// First name byte at or above this marks an unused slot.
pub const UNUSED_MARK: u8 = 0xFE;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Packed two-byte date.
///
/// Day is the top five bits of byte 0. The month index takes the low two bits
/// of byte 0 and the top bit of byte 1. The year is bits 1-6 of byte 1 plus
/// 1970.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HdosDate {
    pub day: u8,
    /// Index into the month names
    pub month: u8,
    pub year: u16,
}

impl HdosDate {
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            day: bytes[0] >> 3,
            month: ((bytes[0] & 0x03) << 1) | (bytes[1] >> 7),
            year: ((bytes[1] >> 1) & 0x3F) as u16 + 1970,
        }
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[self.month as usize % MONTH_NAMES.len()]
    }
}

impl fmt::Display for HdosDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{}-{:02}", self.day, self.month_name(), self.year)
    }
}

bitflags! {
    /// File flag byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HdosFlags: u8 {
        const SYSTEM = 0o200;
        const LOCKED = 0o100;
        const WRITE_PROTECT = 0o040;
        const CONTIGUOUS = 0o020;
    }
}

impl HdosFlags {
    /// Fixed-width `SLWC` text with blanks for clear bits.
    pub fn to_text(self) -> String {
        [
            (Self::SYSTEM, 'S'),
            (Self::LOCKED, 'L'),
            (Self::WRITE_PROTECT, 'W'),
            (Self::CONTIGUOUS, 'C'),
        ]
        .iter()
        .map(|&(flag, ch)| if self.contains(flag) { ch } else { ' ' })
        .collect()
    }
}

/// One decoded directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdosDirEntry {
    pub name: String,
    pub extension: String,
    pub project: u8,
    pub version: u8,
    pub cluster_factor: u8,
    pub flags: HdosFlags,
    pub first_cluster: u8,
    pub last_cluster: u8,
    pub last_sector: u8,
    pub created: HdosDate,
    pub modified: HdosDate,
}

impl HdosDirEntry {
    /// Decode an entry. Returns None for unused slots or short input.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..HDOS_ENTRY_SIZE)?;
        if bytes[0] >= UNUSED_MARK {
            return None;
        }

        Some(Self {
            name: field_text(&bytes[0..8]),
            extension: field_text(&bytes[8..11]),
            project: bytes[11],
            version: bytes[12],
            cluster_factor: bytes[13],
            flags: HdosFlags::from_bits_retain(bytes[14]),
            first_cluster: bytes[16],
            last_cluster: bytes[17],
            last_sector: bytes[18],
            created: HdosDate::from_bytes([bytes[19], bytes[20]]),
            modified: HdosDate::from_bytes([bytes[21], bytes[22]]),
        })
    }

    /// Decode the in-use entries of a directory block.
    pub fn parse_block(block: &[u8]) -> Vec<Self> {
        block
            .chunks_exact(HDOS_ENTRY_SIZE)
            .take(ENTRIES_PER_BLOCK)
            .filter_map(Self::parse)
            .collect()
    }

    /// `NAME.EXT`; the dot is always present.
    pub fn filename(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }

    pub fn matches(&self, wanted: &str) -> bool {
        self.filename().eq_ignore_ascii_case(wanted.trim())
    }
}

fn field_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_decoding() {
        let date = HdosDate::from_bytes([0x08, 0x3C]);
        assert_eq!(date.day, 1);
        assert_eq!(date.month_name(), "JAN");
        assert_eq!(date.year, 2000);
        assert_eq!(date.to_string(), "01-JAN-2000");
    }

    #[test]
    fn test_date_month_spans_bytes() {
        // day 31, month bits 10 + 1, year 63
        let date = HdosDate::from_bytes([(31 << 3) | 0x02, 0x80 | (63 << 1)]);
        assert_eq!(date.day, 31);
        assert_eq!(date.month, 5);
        assert_eq!(date.month_name(), "JUN");
        assert_eq!(date.year, 2033);
    }

    #[test]
    fn test_flags_text() {
        assert_eq!(HdosFlags::from_bits_retain(0o240).to_text(), "S W ");
        assert_eq!(HdosFlags::from_bits_retain(0o120).to_text(), " L C");
        assert_eq!(HdosFlags::empty().to_text(), "    ");
    }

    fn raw_entry(name: &[u8], ext: &[u8]) -> [u8; HDOS_ENTRY_SIZE] {
        let mut e = [0u8; HDOS_ENTRY_SIZE];
        e[..name.len()].copy_from_slice(name);
        e[8..8 + ext.len()].copy_from_slice(ext);
        e[11] = 1;
        e[12] = 2;
        e[14] = 0o200;
        e[16] = 4;
        e[17] = 5;
        e[18] = 1;
        e[19] = 0x08;
        e[20] = 0x3C;
        e[21] = 0x10;
        e[22] = 0x3C;
        e
    }

    #[test]
    fn test_parse_entry() {
        let entry = HdosDirEntry::parse(&raw_entry(b"SYSCMD", b"SYS")).unwrap();

        assert_eq!(entry.filename(), "SYSCMD.SYS");
        assert_eq!(entry.project, 1);
        assert_eq!(entry.version, 2);
        assert!(entry.flags.contains(HdosFlags::SYSTEM));
        assert_eq!((entry.first_cluster, entry.last_cluster, entry.last_sector), (4, 5, 1));
        assert_eq!(entry.modified.day, 2);
        assert!(entry.matches("syscmd.sys"));
    }

    #[test]
    fn test_unused_slots_skipped() {
        let mut block = vec![0u8; 512];
        block[..HDOS_ENTRY_SIZE].copy_from_slice(&raw_entry(b"A", b"B"));
        block[HDOS_ENTRY_SIZE] = 0xFE;
        block[2 * HDOS_ENTRY_SIZE] = 0xFF;
        block[3 * HDOS_ENTRY_SIZE..4 * HDOS_ENTRY_SIZE].copy_from_slice(&raw_entry(b"C", b""));
        for slot in 4..ENTRIES_PER_BLOCK {
            block[slot * HDOS_ENTRY_SIZE] = 0xFF;
        }

        let entries = HdosDirEntry::parse_block(&block);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].filename(), "A.B");
        assert_eq!(entries[1].filename(), "C.");
    }
}
