//! ImageDisk (`.IMD`) container unpacking.
//!
//! Layout:
//! - ASCII comment terminated by 0x1A
//! - Repeated per track:
//!   - 5-byte header: side, track, reserved, sector count, first sector
//!   - sector map (one byte per sector)
//!   - per sector: code byte, then payload
//!     - 0x01: 256 literal bytes
//!     - 0x02: one byte, repeated 256 times
//!
//! Sectors are emitted in the order they are stored. The sector map is kept
//! for inspection but not applied.

use tracing::debug;

use crate::error::{DiskError, DiskResult};
use crate::sector::{MemorySectorStore, Sector, SECTOR_SIZE};

/// Terminates the comment block.
pub const COMMENT_END: u8 = 0x1A;

/// Size of the fixed part of a track header.
pub const TRACK_HEADER_SIZE: usize = 5;

/// Per-sector encoding code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SectorCode {
    /// 256 literal bytes follow
    Normal = 0x01,
    /// One fill byte follows
    Compressed = 0x02,
}

impl TryFrom<u8> for SectorCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Normal),
            0x02 => Ok(Self::Compressed),
            _ => Err(value),
        }
    }
}

/// Decoded track header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHeader {
    pub side: u8,
    pub track: u8,
    pub reserved: u8,
    pub sector_count: u8,
    pub first_sector: u8,
    /// Physical-to-logical numbering as stored; not applied to the output.
    pub sector_map: Vec<u8>,
}

/// A fully decoded container.
#[derive(Debug, Clone)]
pub struct ImdContainer {
    /// Comment text (without the 0x1A terminator)
    pub comment: String,
    pub tracks: Vec<TrackHeader>,
    /// Flat image, sectors in read order
    pub image: Vec<u8>,
}

impl ImdContainer {
    /// Decode a container held in memory.
    pub fn parse(raw: &[u8]) -> DiskResult<Self> {
        let mut cursor = Cursor::new(raw);

        let comment_bytes = cursor.take_until(COMMENT_END)?;
        let comment = String::from_utf8_lossy(comment_bytes).into_owned();

        let mut tracks = Vec::new();
        let mut image = Vec::new();

        while !cursor.at_end() {
            let header = cursor.take(TRACK_HEADER_SIZE)?;
            let sector_count = header[3];
            let sector_map = cursor.take(sector_count as usize)?.to_vec();
            let track = TrackHeader {
                side: header[0],
                track: header[1],
                reserved: header[2],
                sector_count,
                first_sector: header[4],
                sector_map,
            };
            debug!(
                side = track.side,
                track = track.track,
                sectors = track.sector_count,
                "IMD track"
            );

            for _ in 0..sector_count {
                image.extend_from_slice(&read_sector(&mut cursor)?);
            }
            tracks.push(track);
        }

        Ok(Self {
            comment,
            tracks,
            image,
        })
    }

    /// Number of decoded sectors.
    pub fn sector_count(&self) -> usize {
        self.image.len() / SECTOR_SIZE
    }

    pub fn into_store(self) -> MemorySectorStore {
        MemorySectorStore::new(self.image)
    }
}

/// Unpack a container into a flat sector image.
pub fn unpack_imd_container(raw: &[u8]) -> DiskResult<Vec<u8>> {
    ImdContainer::parse(raw).map(|container| container.image)
}

fn read_sector(cursor: &mut Cursor<'_>) -> DiskResult<Sector> {
    let position = cursor.pos;
    let code = cursor.take(1)?[0];

    match SectorCode::try_from(code) {
        Ok(SectorCode::Normal) => {
            let mut sector = [0u8; SECTOR_SIZE];
            sector.copy_from_slice(cursor.take(SECTOR_SIZE)?);
            Ok(sector)
        }
        Ok(SectorCode::Compressed) => {
            let fill = cursor.take(1)?[0];
            Ok([fill; SECTOR_SIZE])
        }
        Err(code) => Err(DiskError::UnknownSectorCode { code, position }),
    }
}

/// Position-tracking reader over the raw container.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> DiskResult<&'a [u8]> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(DiskError::TruncatedContainer(self.pos));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Consume through `terminator`, returning the bytes before it.
    fn take_until(&mut self, terminator: u8) -> DiskResult<&'a [u8]> {
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == terminator)
            .ok_or(DiskError::TruncatedContainer(self.data.len()))?;
        self.pos += len + 1;
        Ok(&rest[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(sectors: u8) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x00, sectors, 0x01];
        bytes.extend(1..=sectors);
        bytes
    }

    #[test]
    fn test_compressed_sector() {
        let mut raw = b"IMD 1.18: test\r\n".to_vec();
        raw.push(COMMENT_END);
        raw.extend(track(1));
        raw.extend([0x02, 0xAA]);

        let image = unpack_imd_container(&raw).unwrap();
        assert_eq!(image, vec![0xAA; SECTOR_SIZE]);
    }

    #[test]
    fn test_literal_sector() {
        let payload: Vec<u8> = (0..=255u8).rev().collect();
        let mut raw = vec![COMMENT_END];
        raw.extend(track(1));
        raw.push(0x01);
        raw.extend(&payload);

        assert_eq!(unpack_imd_container(&raw).unwrap(), payload);
    }

    #[test]
    fn test_unknown_code_reports_position() {
        let mut raw = b"hdr".to_vec();
        raw.push(COMMENT_END);
        raw.extend(track(2));
        raw.extend([0x02, 0x11]);
        let position = raw.len();
        raw.push(0x03);

        match unpack_imd_container(&raw) {
            Err(DiskError::UnknownSectorCode { code, position: p }) => {
                assert_eq!(code, 0x03);
                assert_eq!(p, position);
            }
            other => panic!("expected UnknownSectorCode, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_tracks_keep_read_order() {
        let mut raw = vec![COMMENT_END];
        raw.extend(track(2));
        raw.extend([0x02, 0x01, 0x02, 0x02]);
        raw.extend([0x00, 0x01, 0x00, 0x01, 0x01, 0x01]);
        raw.extend([0x02, 0x03]);

        let container = ImdContainer::parse(&raw).unwrap();
        assert_eq!(container.tracks.len(), 2);
        assert_eq!(container.tracks[0].sector_map, vec![1, 2]);
        assert_eq!(container.tracks[1].track, 1);
        assert_eq!(container.sector_count(), 3);
        assert_eq!(container.image[0], 1);
        assert_eq!(container.image[SECTOR_SIZE], 2);
        assert_eq!(container.image[2 * SECTOR_SIZE], 3);
    }

    #[test]
    fn test_comment_is_kept() {
        let mut raw = b"IMD 1.17: 01/02/2003 04:05:06\r\nGames disk".to_vec();
        raw.push(COMMENT_END);

        let container = ImdContainer::parse(&raw).unwrap();
        assert!(container.comment.ends_with("Games disk"));
        assert!(container.image.is_empty());
    }

    #[test]
    fn test_truncation() {
        // no comment terminator
        assert!(matches!(
            unpack_imd_container(b"IMD"),
            Err(DiskError::TruncatedContainer(_))
        ));

        // partial track header
        let raw = vec![COMMENT_END, 0x00, 0x00];
        assert!(matches!(
            unpack_imd_container(&raw),
            Err(DiskError::TruncatedContainer(_))
        ));

        // literal sector cut short
        let mut raw = vec![COMMENT_END];
        raw.extend(track(1));
        raw.push(0x01);
        raw.extend([0u8; 100]);
        assert!(matches!(
            unpack_imd_container(&raw),
            Err(DiskError::TruncatedContainer(_))
        ));
    }

    #[test]
    fn test_into_store() {
        use crate::sector::SectorStore;

        let mut raw = vec![COMMENT_END];
        raw.extend(track(2));
        raw.extend([0x02, 0xE5, 0x02, 0x00]);

        let store = ImdContainer::parse(&raw).unwrap().into_store();
        assert_eq!(store.sector_count(), 2);
        assert_eq!(store.read_sector(0).unwrap(), [0xE5; SECTOR_SIZE]);
    }
}
