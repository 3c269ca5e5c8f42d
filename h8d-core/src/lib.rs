//! Heathkit H8/H89 Disk Image Core
//!
//! This crate decodes the disk images of Heathkit H8/H89 systems:
//! - CP/M volumes on H17 and H37 media (skewed block allocation)
//! - HDOS volumes (label, Group Reservation Table, chained directory)
//! - ImageDisk (`.IMD`) containers, unpacked to flat sector images
//!
//! # Architecture
//!
//! The readers use a layered design:
//! - `SectorStore` trait: 256-byte sector access over memory or a file
//! - `CpmVolume` / `HdosVolume`: directory snapshot taken at open, data on demand
//! - `Volume` trait: the list/resolve/read shape both filesystems share
//!
//! Everything is read-only.

pub mod cpm;
pub mod error;
pub mod geometry;
pub mod hdos;
pub mod image;
pub mod imd;
pub mod sector;
pub mod volume;

pub use cpm::{CpmDirEntry, CpmFile, CpmFileSummary, CpmVolume};
pub use error::{DiskError, DiskResult};
pub use geometry::{DiskFormatKind, DiskGeometry, Sides};
pub use hdos::{HdosCatalog, HdosDirEntry, HdosFile, HdosLabel, HdosListing, HdosVolume};
pub use image::{load_store, LoadedImage};
pub use imd::{unpack_imd_container, ImdContainer};
pub use sector::{FileSectorStore, MemorySectorStore, SectorStore, SECTOR_SIZE};
pub use volume::{open_volume, FileContents, FilesystemKind, Volume, VolumeEntry, VolumeListing};
