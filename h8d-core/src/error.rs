//! Error types for disk image decoding.

use thiserror::Error;

/// Errors that can occur while reading a disk image.
#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Sector {index} out of range (image has {count} sectors)")]
    SectorOutOfRange { index: u32, count: u32 },

    #[error("Short read on sector {index}: {available} of 256 bytes")]
    ShortRead { index: u32, available: usize },

    #[error("Cannot read directory sector {sector}: {source}")]
    DirectoryUnreadable {
        sector: u32,
        #[source]
        source: Box<DiskError>,
    },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unknown sector code {code:02X} at position {position:04X}")]
    UnknownSectorCode { code: u8, position: usize },

    #[error("Container truncated at position {0:04X}")]
    TruncatedContainer(usize),

    #[error("Suspect volume label: {0:?}")]
    SuspectVolumeLabel(String),

    #[error("Corrupt {chain} chain: {detail}")]
    CorruptChain { chain: &'static str, detail: String },

    #[error("Extent {extent} of {name} claims {record_count} records but its blocks hold {available}")]
    RecordCountExceedsAllocation {
        name: String,
        extent: u8,
        record_count: usize,
        available: usize,
    },

    #[error("Block {block} of {name} maps to sector {sector}, past the {total}-sector disk")]
    BlockOutOfRange {
        name: String,
        block: u8,
        sector: u32,
        total: u32,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("No disk image found in archive")]
    NoImageInArchive,

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiskError {
    /// Wrap a sector read failure as a fatal directory failure.
    pub(crate) fn directory(sector: u32, source: DiskError) -> Self {
        DiskError::DirectoryUnreadable {
            sector,
            source: Box::new(source),
        }
    }

    pub(crate) fn corrupt_chain(chain: &'static str, detail: impl Into<String>) -> Self {
        DiskError::CorruptChain {
            chain,
            detail: detail.into(),
        }
    }
}

/// Result type for disk operations.
pub type DiskResult<T> = Result<T, DiskError>;
