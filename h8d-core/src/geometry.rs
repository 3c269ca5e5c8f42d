//! Disk geometry and the Heathkit CP/M skew tables.
//!
//! Heath CP/M allocates 1 KiB blocks (four 256-byte sectors) that are not
//! physically contiguous. Five consecutive blocks share a 20-sector group, and
//! the kind-specific table gives each block's sector offsets inside it:
//!
//! ```text
//! block b -> group b / 5, row b % 5
//! sector  =  DATA_START_SECTOR + group * 20 + TABLE[row][i]
//! ```
//!
//! The directory is the start of block 0, so the directory sectors also fall
//! out of row 0 of the table.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DiskError, DiskResult};
use crate::sector::SECTOR_SIZE;

/// Sectors in one allocation block.
pub const SECTORS_PER_BLOCK: usize = 4;

/// Rows in a skew table (blocks per group).
pub const BLOCKS_PER_GROUP: u32 = 5;

/// Sectors covered by one block group.
pub const SECTORS_PER_GROUP: u32 = BLOCKS_PER_GROUP * SECTORS_PER_BLOCK as u32;

/// First sector of the CP/M data area (block 0), after the three system tracks.
pub const DATA_START_SECTOR: u32 = 30;

/// Block -> sector offsets for H17 hard-sectored media.
pub const H17_SKEW: [[u32; SECTORS_PER_BLOCK]; 5] = [
    [0, 4, 8, 2],
    [6, 1, 5, 9],
    [3, 7, 10, 14],
    [18, 12, 16, 11],
    [15, 19, 13, 17],
];

/// Block -> sector offsets for H37 soft-sectored media.
pub const H37_SKEW: [[u32; SECTORS_PER_BLOCK]; 5] = [
    [0, 3, 6, 9],
    [12, 15, 18, 1],
    [4, 7, 10, 13],
    [16, 19, 2, 5],
    [8, 11, 14, 17],
];

/// Number of recording surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sides {
    Single,
    Double,
}

impl Sides {
    pub fn count(self) -> u32 {
        match self {
            Sides::Single => 1,
            Sides::Double => 2,
        }
    }
}

/// Physical layout of a disk, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskGeometry {
    pub sides: Sides,
    pub tracks: u32,
    pub sectors_per_track: u32,
    #[serde(default = "default_sector_size")]
    pub bytes_per_sector: u32,
    /// Some formats record fewer sectors on track 0; defaults to `sectors_per_track`.
    #[serde(default)]
    pub sectors_on_track_zero: Option<u32>,
}

fn default_sector_size() -> u32 {
    SECTOR_SIZE as u32
}

impl DiskGeometry {
    /// H17: single-sided, 40 tracks, 10 hard sectors.
    pub fn h17_sssd40() -> Self {
        Self {
            sides: Sides::Single,
            tracks: 40,
            sectors_per_track: 10,
            bytes_per_sector: SECTOR_SIZE as u32,
            sectors_on_track_zero: None,
        }
    }

    /// H37: double-sided, 80 tracks, 16 soft sectors.
    pub fn h37_dsdd80() -> Self {
        Self {
            sides: Sides::Double,
            tracks: 80,
            sectors_per_track: 16,
            bytes_per_sector: SECTOR_SIZE as u32,
            sectors_on_track_zero: None,
        }
    }

    /// Load a geometry from a JSON file.
    ///
    /// ```json
    /// { "sides": "single", "tracks": 40, "sectorsPerTrack": 10 }
    /// ```
    pub fn from_json_path(path: impl AsRef<Path>) -> DiskResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let geometry: DiskGeometry = serde_json::from_str(&text)?;
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn sectors_on_track_zero(&self) -> u32 {
        self.sectors_on_track_zero.unwrap_or(self.sectors_per_track)
    }

    /// Total sectors on the disk.
    pub fn total_sectors(&self) -> u32 {
        let surfaces = self.tracks * self.sides.count();
        if surfaces == 0 {
            return 0;
        }
        self.sectors_on_track_zero() + (surfaces - 1) * self.sectors_per_track
    }

    pub fn validate(&self) -> DiskResult<()> {
        if self.bytes_per_sector != SECTOR_SIZE as u32 {
            return Err(DiskError::InvalidGeometry(format!(
                "sector size {} (only {} is supported)",
                self.bytes_per_sector, SECTOR_SIZE
            )));
        }
        if self.tracks == 0 || self.sectors_per_track == 0 {
            return Err(DiskError::InvalidGeometry(
                "tracks and sectors per track must be non-zero".to_string(),
            ));
        }
        if self.total_sectors() <= DATA_START_SECTOR {
            return Err(DiskError::InvalidGeometry(format!(
                "{} sectors leave no room for a data area",
                self.total_sectors()
            )));
        }
        Ok(())
    }
}

impl Default for DiskGeometry {
    fn default() -> Self {
        Self::h17_sssd40()
    }
}

/// Heath CP/M media family, selecting skew table and directory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskFormatKind {
    #[default]
    H17,
    H37,
}

impl DiskFormatKind {
    pub fn skew_table(self) -> &'static [[u32; SECTORS_PER_BLOCK]; 5] {
        match self {
            DiskFormatKind::H17 => &H17_SKEW,
            DiskFormatKind::H37 => &H37_SKEW,
        }
    }

    /// Number of leading block-0 sectors holding the directory.
    pub fn directory_sector_count(self) -> usize {
        match self {
            DiskFormatKind::H17 => 2,
            DiskFormatKind::H37 => 4,
        }
    }

    /// Directory sectors in read order (H17: 30, 34; H37: 30, 33, 36, 39).
    pub fn directory_sectors(self) -> Vec<u32> {
        self.skew_table()[0]
            .iter()
            .take(self.directory_sector_count())
            .map(|offset| DATA_START_SECTOR + offset)
            .collect()
    }

    /// Physical sectors of an allocation block, in logical order.
    pub fn block_sectors(self, block: u8) -> [u32; SECTORS_PER_BLOCK] {
        let block = block as u32;
        let base = DATA_START_SECTOR + (block / BLOCKS_PER_GROUP) * SECTORS_PER_GROUP;
        let row = &self.skew_table()[(block % BLOCKS_PER_GROUP) as usize];
        row.map(|offset| base + offset)
    }
}

impl fmt::Display for DiskFormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskFormatKind::H17 => write!(f, "H17"),
            DiskFormatKind::H37 => write!(f, "H37"),
        }
    }
}

impl FromStr for DiskFormatKind {
    type Err = DiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "H17" => Ok(DiskFormatKind::H17),
            "H37" => Ok(DiskFormatKind::H37),
            other => Err(DiskError::InvalidGeometry(format!(
                "unknown format kind {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_permutation(table: &[[u32; SECTORS_PER_BLOCK]; 5]) {
        let mut seen = [false; SECTORS_PER_GROUP as usize];
        for offset in table.iter().flatten() {
            assert!(!seen[*offset as usize], "offset {} repeated", offset);
            seen[*offset as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_skew_tables_are_permutations() {
        assert_permutation(&H17_SKEW);
        assert_permutation(&H37_SKEW);
    }

    #[test]
    fn test_directory_sectors() {
        assert_eq!(DiskFormatKind::H17.directory_sectors(), vec![30, 34]);
        assert_eq!(DiskFormatKind::H37.directory_sectors(), vec![30, 33, 36, 39]);
    }

    #[test]
    fn test_block_sectors_repeat_per_group() {
        assert_eq!(DiskFormatKind::H17.block_sectors(0), [30, 34, 38, 32]);
        assert_eq!(DiskFormatKind::H17.block_sectors(3), [48, 42, 46, 41]);
        assert_eq!(DiskFormatKind::H17.block_sectors(5), [50, 54, 58, 52]);
        assert_eq!(DiskFormatKind::H37.block_sectors(6), [62, 65, 68, 51]);
    }

    #[test]
    fn test_total_sectors() {
        assert_eq!(DiskGeometry::h17_sssd40().total_sectors(), 400);
        assert_eq!(DiskGeometry::h37_dsdd80().total_sectors(), 2560);

        let odd = DiskGeometry {
            sectors_on_track_zero: Some(8),
            ..DiskGeometry::h17_sssd40()
        };
        assert_eq!(odd.total_sectors(), 398);
    }

    #[test]
    fn test_validate() {
        assert!(DiskGeometry::default().validate().is_ok());

        let bad = DiskGeometry {
            bytes_per_sector: 512,
            ..DiskGeometry::default()
        };
        assert!(matches!(bad.validate(), Err(DiskError::InvalidGeometry(_))));
    }

    #[test]
    fn test_geometry_json() {
        let geometry: DiskGeometry =
            serde_json::from_str(r#"{ "sides": "double", "tracks": 40, "sectorsPerTrack": 10 }"#)
                .unwrap();
        assert_eq!(geometry.sides, Sides::Double);
        assert_eq!(geometry.bytes_per_sector, 256);
        assert_eq!(geometry.total_sectors(), 800);
    }

    #[test]
    fn test_format_kind_from_str() {
        assert_eq!("h37".parse::<DiskFormatKind>().unwrap(), DiskFormatKind::H37);
        assert!("h89".parse::<DiskFormatKind>().is_err());
    }
}
