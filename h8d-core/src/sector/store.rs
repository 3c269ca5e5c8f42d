//! SectorStore trait - the leaf interface for all disk reads.

use std::sync::Arc;

use crate::error::{DiskError, DiskResult};

/// Sector size for every H8/H89 format handled here.
pub const SECTOR_SIZE: usize = 256;

/// One physical sector.
pub type Sector = [u8; SECTOR_SIZE];

/// Read-only access to an image as a sequence of 256-byte sectors.
///
/// Every successful read returns a full sector. Reads past the end fail with
/// `SectorOutOfRange`; a trailing partial sector fails with `ShortRead`.
pub trait SectorStore: Send + Sync {
    /// Number of addressable sectors, counting a trailing partial sector.
    fn sector_count(&self) -> u32;

    /// Read one sector.
    fn read_sector(&self, index: u32) -> DiskResult<Sector>;

    /// Read two consecutive sectors as one 512-byte block.
    fn read_sector_pair(&self, index: u32) -> DiskResult<[u8; 2 * SECTOR_SIZE]> {
        let first = self.read_sector(index)?;
        let second = self.read_sector(index + 1)?;
        let mut pair = [0u8; 2 * SECTOR_SIZE];
        pair[..SECTOR_SIZE].copy_from_slice(&first);
        pair[SECTOR_SIZE..].copy_from_slice(&second);
        Ok(pair)
    }
}

impl<T: SectorStore + ?Sized> SectorStore for &T {
    fn sector_count(&self) -> u32 {
        (**self).sector_count()
    }

    fn read_sector(&self, index: u32) -> DiskResult<Sector> {
        (**self).read_sector(index)
    }
}

impl<T: SectorStore + ?Sized> SectorStore for Box<T> {
    fn sector_count(&self) -> u32 {
        (**self).sector_count()
    }

    fn read_sector(&self, index: u32) -> DiskResult<Sector> {
        (**self).read_sector(index)
    }
}

impl<T: SectorStore + ?Sized> SectorStore for Arc<T> {
    fn sector_count(&self) -> u32 {
        (**self).sector_count()
    }

    fn read_sector(&self, index: u32) -> DiskResult<Sector> {
        (**self).read_sector(index)
    }
}

/// Copy a sector out of a byte image, applying the range and length rules.
pub(crate) fn slice_sector(bytes: &[u8], index: u32) -> DiskResult<Sector> {
    let count = sector_count_for(bytes.len() as u64);
    if index >= count {
        return Err(DiskError::SectorOutOfRange { index, count });
    }

    let start = index as usize * SECTOR_SIZE;
    let available = (bytes.len() - start).min(SECTOR_SIZE);
    if available < SECTOR_SIZE {
        return Err(DiskError::ShortRead { index, available });
    }

    let mut sector = [0u8; SECTOR_SIZE];
    sector.copy_from_slice(&bytes[start..start + SECTOR_SIZE]);
    Ok(sector)
}

/// Sectors addressable in an image of `len` bytes (partial tail included).
pub(crate) fn sector_count_for(len: u64) -> u32 {
    len.div_ceil(SECTOR_SIZE as u64) as u32
}
