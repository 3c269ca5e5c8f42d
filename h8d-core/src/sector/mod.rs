//! Sector-addressed views over disk image bytes.
//!
//! This module provides the storage layer every volume reader sits on:
//! - `SectorStore`: fixed 256-byte sector interface
//! - `MemorySectorStore`: in-memory image (also the IMD unpacker's output)
//! - `FileSectorStore`: random-access image file

mod file_store;
mod memory_store;
mod store;

pub use file_store::FileSectorStore;
pub use memory_store::MemorySectorStore;
pub use store::{Sector, SectorStore, SECTOR_SIZE};
