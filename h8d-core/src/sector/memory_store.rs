//! In-memory sector store.

use super::store::{sector_count_for, slice_sector, Sector, SectorStore, SECTOR_SIZE};
use crate::error::DiskResult;

/// Disk image held entirely in memory.
#[derive(Default, Clone, Debug)]
pub struct MemorySectorStore {
    bytes: Vec<u8>,
}

impl MemorySectorStore {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Create a zero-filled image of `count` sectors.
    pub fn blank(count: u32) -> Self {
        Self::new(vec![0u8; count as usize * SECTOR_SIZE])
    }

    /// Overwrite a sector (convenience for building test images).
    ///
    /// The image grows as needed. Short data leaves the rest of the sector untouched.
    pub fn put_sector(&mut self, index: u32, data: &[u8]) {
        let start = index as usize * SECTOR_SIZE;
        if self.bytes.len() < start + SECTOR_SIZE {
            self.bytes.resize(start + SECTOR_SIZE, 0);
        }
        let len = data.len().min(SECTOR_SIZE);
        self.bytes[start..start + len].copy_from_slice(&data[..len]);
    }

    /// Append a sector to the end of the image.
    pub fn push_sector(&mut self, sector: &Sector) {
        self.bytes.extend_from_slice(sector);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl SectorStore for MemorySectorStore {
    fn sector_count(&self) -> u32 {
        sector_count_for(self.bytes.len() as u64)
    }

    fn read_sector(&self, index: u32) -> DiskResult<Sector> {
        slice_sector(&self.bytes, index)
    }
}
