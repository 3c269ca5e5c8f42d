//! HDOS volume label (sector 9).
//!
//! Layout:
//! - Byte 0: Serial number
//! - Bytes 1-2: Init date (packed, see `HdosDate`)
//! - Bytes 3-4: First directory sector (LE)
//! - Bytes 5-6: GRT sector (LE)
//! - Byte 7: Sectors per group
//! - Byte 8: Volume type
//! - Byte 9: INIT.ABS version
//! - Bytes 10-11: RGT sector (version >= 0x20)
//! - Bytes 12-13: Total sectors (version >= 0x20)
//! - Bytes 14-15: Physical sector size (version >= 0x20)
//! - Byte 16: Volume flags (version >= 0x20)
//! - Bytes 17-76: Label text (zero-terminated)
//! - Byte 79: Sectors per track (version >= 0x20)

use super::entry::HdosDate;
use crate::sector::Sector;

/// Sector holding the label.
pub const LABEL_SECTOR: u32 = 9;

/// First INIT.ABS version recording the extended geometry fields.
pub const EXTENDED_LABEL_VERSION: u8 = 0x20;

/// Defaults for labels older than `EXTENDED_LABEL_VERSION` (H17 SSSD).
pub const DEFAULT_TOTAL_SECTORS: u16 = 400;
pub const DEFAULT_SECTOR_SIZE: u16 = 256;
pub const DEFAULT_SECTORS_PER_TRACK: u8 = 10;

const LABEL_TEXT: std::ops::Range<usize> = 17..77;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdosLabel {
    pub serial: u8,
    pub init_date: HdosDate,
    pub directory_sector: u16,
    pub grt_sector: u16,
    pub sectors_per_group: u8,
    pub volume_type: u8,
    pub version: u8,
    pub rgt_sector: u16,
    pub total_sectors: u16,
    pub sector_size: u16,
    pub volume_flags: u8,
    pub sectors_per_track: u8,
    /// Label text up to the first zero
    pub text: String,
    /// Some label byte is outside printable ASCII
    pub suspect: bool,
}

impl HdosLabel {
    pub fn parse(sector: &Sector) -> Self {
        let word = |at: usize| u16::from_le_bytes([sector[at], sector[at + 1]]);

        let version = sector[9];
        let extended = version >= EXTENDED_LABEL_VERSION;

        let raw_text = &sector[LABEL_TEXT];
        let end = raw_text.iter().position(|&b| b == 0).unwrap_or(raw_text.len());
        let raw_text = &raw_text[..end];
        let suspect = raw_text.iter().any(|&b| !(0x20..=0x7E).contains(&b));

        Self {
            serial: sector[0],
            init_date: HdosDate::from_bytes([sector[1], sector[2]]),
            directory_sector: word(3),
            grt_sector: word(5),
            sectors_per_group: sector[7],
            volume_type: sector[8],
            version,
            rgt_sector: if extended { word(10) } else { 0 },
            total_sectors: if extended { word(12) } else { DEFAULT_TOTAL_SECTORS },
            sector_size: if extended { word(14) } else { DEFAULT_SECTOR_SIZE },
            volume_flags: if extended { sector[16] } else { 0 },
            sectors_per_track: if extended {
                sector[79]
            } else {
                DEFAULT_SECTORS_PER_TRACK
            },
            text: String::from_utf8_lossy(raw_text).into_owned(),
            suspect,
        }
    }

    /// Tracks and sides as recorded in the volume flags (version >= 0x20).
    pub fn layout(&self) -> &'static str {
        match self.volume_flags & 0x03 {
            0 => "40 tracks, 1 side",
            1 => "40 tracks, 2 sides",
            2 => "80 tracks, 1 side",
            _ => "80 tracks, 2 sides",
        }
    }
}
