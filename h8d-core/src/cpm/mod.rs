//! Heath CP/M volumes.
//!
//! This module decodes the CP/M directory and maps files onto 128-byte
//! records through the H17/H37 skew tables:
//! - `CpmDirEntry`: 32-byte directory entry
//! - `CpmVolume`: directory snapshot plus record access

mod entry;
mod volume;

pub use entry::{
    CpmAttributes, CpmDirEntry, EntryKind, DELETED_USER, DIR_ENTRY_SIZE, MAX_EXTENT_RECORDS,
};
pub use volume::{
    split_cpm_name, CpmFile, CpmFileSummary, CpmVolume, Record, RECORDS_PER_BLOCK, RECORD_SIZE,
};
