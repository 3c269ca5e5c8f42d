//! HDOS volumes.
//!
//! HDOS keeps its volume description in a label at sector 9, allocates
//! space in clusters linked through a one-sector Group Reservation Table, and
//! stores its directory as a chain of 512-byte blocks.

mod entry;
mod grt;
mod label;
mod volume;

pub use entry::{HdosDate, HdosDirEntry, HdosFlags, ENTRIES_PER_BLOCK, HDOS_ENTRY_SIZE, UNUSED_MARK};
pub use grt::Grt;
pub use label::{HdosLabel, EXTENDED_LABEL_VERSION, LABEL_SECTOR};
pub use volume::{
    DirectoryWalk, HdosCatalog, HdosFile, HdosListing, HdosVolume, CHAIN_VECTOR_OFFSET,
};
