//! File-backed sector store.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use super::store::{sector_count_for, Sector, SectorStore, SECTOR_SIZE};
use crate::error::{DiskError, DiskResult};

/// Disk image read sector by sector from a file.
///
/// Seek+read is not atomic, so the handle sits behind a mutex and the store
/// can be shared between volumes.
pub struct FileSectorStore {
    file: Mutex<File>,
    len: u64,
}

impl FileSectorStore {
    pub fn open(path: impl AsRef<Path>) -> DiskResult<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    pub fn from_file(file: File) -> DiskResult<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }

    /// Image size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl SectorStore for FileSectorStore {
    fn sector_count(&self) -> u32 {
        sector_count_for(self.len)
    }

    fn read_sector(&self, index: u32) -> DiskResult<Sector> {
        let count = self.sector_count();
        if index >= count {
            return Err(DiskError::SectorOutOfRange { index, count });
        }

        let mut file = self.file.lock().map_err(|_| DiskError::LockPoisoned)?;
        file.seek(SeekFrom::Start(index as u64 * SECTOR_SIZE as u64))?;

        let mut sector = [0u8; SECTOR_SIZE];
        let mut filled = 0;
        while filled < SECTOR_SIZE {
            let n = file.read(&mut sector[filled..])?;
            if n == 0 {
                return Err(DiskError::ShortRead {
                    index,
                    available: filled,
                });
            }
            filled += n;
        }
        Ok(sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn image_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_sector_from_file() {
        let mut bytes = vec![0u8; 3 * SECTOR_SIZE];
        bytes[SECTOR_SIZE..2 * SECTOR_SIZE].fill(0x5A);
        let file = image_file(&bytes);

        let store = FileSectorStore::open(file.path()).unwrap();
        assert_eq!(store.sector_count(), 3);
        assert_eq!(store.len(), 768);
        assert_eq!(store.read_sector(1).unwrap(), [0x5A; SECTOR_SIZE]);
    }

    #[test]
    fn test_file_out_of_range_and_short_read() {
        let file = image_file(&vec![7u8; SECTOR_SIZE + 10]);
        let store = FileSectorStore::open(file.path()).unwrap();

        assert!(matches!(
            store.read_sector(5),
            Err(DiskError::SectorOutOfRange { index: 5, count: 2 })
        ));
        assert!(matches!(
            store.read_sector(1),
            Err(DiskError::ShortRead {
                index: 1,
                available: 10
            })
        ));
    }
}
