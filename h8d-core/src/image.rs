//! Opening disk images from the host filesystem.
//!
//! Images come as raw sector dumps (`.h8d`, `.img`, ...), ImageDisk
//! containers (`.imd`) or ZIP archives holding either of those.

use std::io::{Read, Seek};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::error::{DiskError, DiskResult};
use crate::imd::ImdContainer;
use crate::sector::{FileSectorStore, MemorySectorStore, SectorStore};

/// Extensions recognised as raw sector images inside an archive.
pub const RAW_EXTENSIONS: [&str; 3] = ["H8D", "H37", "IMG"];

/// Extension of ImageDisk containers.
pub const IMD_EXTENSION: &str = "IMD";

/// Where an opened image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Raw,
    /// Unpacked ImageDisk container (comment text kept)
    ImageDisk { comment: String },
    /// Member of a ZIP archive
    Archive { member: String, imd: bool },
}

/// An image ready for mounting.
pub struct LoadedImage {
    pub store: Box<dyn SectorStore>,
    pub source: ImageSource,
    /// Image size in bytes
    pub size: u64,
}

fn upper_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_uppercase()
}

/// Open an image file, unpacking containers as needed.
pub fn load_store(path: impl AsRef<Path>) -> DiskResult<LoadedImage> {
    let path = path.as_ref();
    let ext = upper_extension(&path.to_string_lossy());

    if ext == IMD_EXTENSION {
        let raw = std::fs::read(path)?;
        let container = ImdContainer::parse(&raw)?;
        let comment = container.comment.clone();
        let store = container.into_store();
        return Ok(LoadedImage {
            size: store.as_bytes().len() as u64,
            store: Box::new(store),
            source: ImageSource::ImageDisk { comment },
        });
    }

    if ext == "ZIP" {
        let file = std::fs::File::open(path)?;
        return load_from_archive(file);
    }

    let store = FileSectorStore::open(path)?;
    Ok(LoadedImage {
        size: store.len(),
        store: Box::new(store),
        source: ImageSource::Raw,
    })
}

/// Load the first disk image found in a ZIP archive.
pub fn load_from_archive<R: Read + Seek>(reader: R) -> DiskResult<LoadedImage> {
    let mut archive = ZipArchive::new(reader)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        let ext = upper_extension(&name);
        let imd = ext == IMD_EXTENSION;
        if !imd && !RAW_EXTENSIONS.contains(&ext.as_str()) {
            debug!(member = %name, "skipping archive member");
            continue;
        }

        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        let content = if imd {
            ImdContainer::parse(&content)?.image
        } else {
            content
        };

        debug!(member = %name, bytes = content.len(), "loaded image from archive");
        return Ok(LoadedImage {
            size: content.len() as u64,
            store: Box::new(MemorySectorStore::new(content)),
            source: ImageSource::Archive { member: name, imd },
        });
    }

    Err(DiskError::NoImageInArchive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn create_test_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut zip = zip::ZipWriter::new(cursor);
            for (name, data) in members {
                zip.start_file::<_, ()>(*name, Default::default()).unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_archive_raw_member() {
        let image = vec![0x33u8; 512];
        let zip = create_test_zip(&[("README.TXT", b"hello"), ("disks/GAMES.H8D", &image)]);

        let loaded = load_from_archive(Cursor::new(zip)).unwrap();
        assert_eq!(loaded.store.sector_count(), 2);
        assert_eq!(loaded.size, 512);
        assert_eq!(
            loaded.source,
            ImageSource::Archive {
                member: "disks/GAMES.H8D".to_string(),
                imd: false
            }
        );
    }

    #[test]
    fn test_archive_imd_member() {
        let imd = [0x1A, 0, 0, 0, 1, 1, 1, 0x02, 0x77];
        let zip = create_test_zip(&[("disk.imd", &imd)]);

        let loaded = load_from_archive(Cursor::new(zip)).unwrap();
        assert_eq!(loaded.store.read_sector(0).unwrap(), [0x77; 256]);
    }

    #[test]
    fn test_archive_without_image() {
        let zip = create_test_zip(&[("notes.txt", b"nothing here")]);
        assert!(matches!(
            load_from_archive(Cursor::new(zip)),
            Err(DiskError::NoImageInArchive)
        ));
    }

    #[test]
    fn test_load_raw_and_imd_files() {
        let dir = tempfile::tempdir().unwrap();

        let raw_path = dir.path().join("disk.h8d");
        std::fs::write(&raw_path, vec![0u8; 1024]).unwrap();
        let raw = load_store(&raw_path).unwrap();
        assert_eq!(raw.source, ImageSource::Raw);
        assert_eq!(raw.store.sector_count(), 4);

        let imd_path = dir.path().join("disk.IMD");
        std::fs::write(&imd_path, b"note\x1a\x00\x00\x00\x01\x01\x01\x02\x00").unwrap();
        let imd = load_store(&imd_path).unwrap();
        assert_eq!(
            imd.source,
            ImageSource::ImageDisk {
                comment: "note".to_string()
            }
        );
        assert_eq!(imd.size, 256);
    }
}
