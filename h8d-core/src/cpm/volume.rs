//! CP/M volume: directory snapshot and record mapping.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::entry::{CpmDirEntry, MAX_EXTENT_RECORDS};
use crate::error::{DiskError, DiskResult};
use crate::geometry::{DiskFormatKind, DiskGeometry, SECTORS_PER_BLOCK};
use crate::sector::{SectorStore, SECTOR_SIZE};
use crate::volume::{collect_units, FileContents};

/// Record size in CP/M (always 128 bytes).
pub const RECORD_SIZE: usize = 128;

/// Records per 256-byte sector.
const RECORDS_PER_SECTOR: usize = SECTOR_SIZE / RECORD_SIZE;

/// Records per allocation block.
pub const RECORDS_PER_BLOCK: usize = SECTORS_PER_BLOCK * RECORDS_PER_SECTOR;

/// One 128-byte record.
pub type Record = [u8; RECORD_SIZE];

/// A file resolved to its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpmFile {
    pub user: u8,
    pub name: String,
    pub extension: String,
    /// Absolute record numbers in file order
    pub records: Vec<u32>,
    /// Extents that contributed records
    pub extents: usize,
}

/// One row per distinct file, extents merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpmFileSummary {
    pub user: u8,
    pub name: String,
    pub extension: String,
    /// `WSA` text from the extent-0 entry
    pub flags: String,
    pub extents: usize,
    pub records: usize,
}

impl CpmFileSummary {
    pub fn filename(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }
}

/// A CP/M volume on Heath H17/H37 media.
///
/// The directory is read once at open; data records are read on demand.
pub struct CpmVolume<S: SectorStore> {
    store: S,
    geometry: DiskGeometry,
    kind: DiskFormatKind,
    entries: Vec<CpmDirEntry>,
}

impl<S: SectorStore> CpmVolume<S> {
    /// Read and decode the directory.
    pub fn open(store: S, geometry: DiskGeometry, kind: DiskFormatKind) -> DiskResult<Self> {
        geometry.validate()?;

        let sectors = kind.directory_sectors();
        let mut directory = Vec::with_capacity(sectors.len() * SECTOR_SIZE);
        for sector in sectors {
            let data = store
                .read_sector(sector)
                .map_err(|e| DiskError::directory(sector, e))?;
            directory.extend_from_slice(&data);
        }

        let entries = CpmDirEntry::parse_all(&directory);
        debug!(
            kind = %kind,
            entries = entries.len(),
            normal = entries.iter().filter(|e| e.is_normal()).count(),
            "CP/M directory loaded"
        );

        Ok(Self {
            store,
            geometry,
            kind,
            entries,
        })
    }

    pub fn geometry(&self) -> &DiskGeometry {
        &self.geometry
    }

    pub fn kind(&self) -> DiskFormatKind {
        self.kind
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every directory slot, deleted and special ones included.
    pub fn list_entries(&self) -> &[CpmDirEntry] {
        &self.entries
    }

    /// Distinct files in directory order with record counts summed over extents.
    pub fn list_files(&self) -> Vec<CpmFileSummary> {
        let mut files: Vec<CpmFileSummary> = Vec::new();
        let mut index: HashMap<(u8, String, String), usize> = HashMap::new();

        for entry in self.entries.iter().filter(|e| e.is_normal()) {
            let key = (entry.user, entry.name(), entry.extension());
            let pos = *index.entry(key).or_insert_with(|| {
                files.push(CpmFileSummary {
                    user: entry.user,
                    name: entry.name(),
                    extension: entry.extension(),
                    flags: String::new(),
                    extents: 0,
                    records: 0,
                });
                files.len() - 1
            });

            let file = &mut files[pos];
            file.extents += 1;
            file.records += entry.record_count as usize;
            if entry.extent == 0 {
                file.flags = entry.attributes.to_text();
            }
        }

        files
    }

    /// Absolute record numbers of one allocation block, in file order.
    pub fn block_records(&self, block: u8) -> [u32; RECORDS_PER_BLOCK] {
        let mut records = [0u32; RECORDS_PER_BLOCK];
        for (i, sector) in self.kind.block_sectors(block).iter().enumerate() {
            for half in 0..RECORDS_PER_SECTOR {
                records[i * RECORDS_PER_SECTOR + half] =
                    sector * RECORDS_PER_SECTOR as u32 + half as u32;
            }
        }
        records
    }

    /// Records of one extent, cut to its record count.
    ///
    /// Every block must lie inside the geometry's sector count.
    pub fn extent_records(&self, entry: &CpmDirEntry) -> DiskResult<Vec<u32>> {
        let total = self.geometry.total_sectors();
        for &block in &entry.blocks {
            let last = self.kind.block_sectors(block).into_iter().max().unwrap_or(0);
            if last >= total {
                return Err(DiskError::BlockOutOfRange {
                    name: entry.filename(),
                    block,
                    sector: last,
                    total,
                });
            }
        }

        let mut records: Vec<u32> = entry
            .blocks
            .iter()
            .flat_map(|&block| self.block_records(block))
            .collect();

        let wanted = entry.record_count as usize;
        if wanted > records.len() {
            return Err(DiskError::RecordCountExceedsAllocation {
                name: entry.filename(),
                extent: entry.extent,
                record_count: wanted,
                available: records.len(),
            });
        }
        records.truncate(wanted);
        Ok(records)
    }

    /// Resolve a file to its records across all extents.
    ///
    /// Extents are taken in order 0, 1, 2...; the scan ends at the first
    /// partially filled extent or at a missing extent number.
    pub fn resolve_file(&self, user: u8, name: &str, ext: &str) -> DiskResult<CpmFile> {
        let mut records = Vec::new();
        let mut extents = 0;

        for extent in 0..MAX_EXTENT_RECORDS as u8 {
            let found = self
                .entries
                .iter()
                .find(|e| e.is_normal() && e.extent == extent && e.matches(user, name, ext));

            let Some(entry) = found else {
                if extent == 0 {
                    return Err(DiskError::FileNotFound(display_name(user, name, ext)));
                }
                break;
            };

            records.extend(self.extent_records(entry)?);
            extents += 1;

            if entry.is_last_extent() {
                break;
            }
        }

        debug!(
            file = %display_name(user, name, ext),
            extents,
            records = records.len(),
            "CP/M file resolved"
        );

        Ok(CpmFile {
            user,
            name: name.trim().to_uppercase(),
            extension: ext.trim().to_uppercase(),
            records,
            extents,
        })
    }

    /// Read one 128-byte record.
    pub fn read_record(&self, record: u32) -> DiskResult<Record> {
        let sector = self.store.read_sector(record / RECORDS_PER_SECTOR as u32)?;
        let start = (record as usize % RECORDS_PER_SECTOR) * RECORD_SIZE;

        let mut out = [0u8; RECORD_SIZE];
        out.copy_from_slice(&sector[start..start + RECORD_SIZE]);
        Ok(out)
    }

    /// Read a file's records, skipping (and reporting) unreadable ones.
    pub fn read_file(&self, user: u8, name: &str, ext: &str) -> DiskResult<FileContents> {
        let file = self.resolve_file(user, name, ext)?;
        Ok(collect_units(
            &display_name(user, name, ext),
            &file.records,
            RECORD_SIZE,
            |record| self.read_record(record),
        ))
    }
}

fn display_name(user: u8, name: &str, ext: &str) -> String {
    let name = name.trim().to_uppercase();
    let ext = ext.trim().to_uppercase();
    if ext.is_empty() {
        format!("{}:{}", user, name)
    } else {
        format!("{}:{}.{}", user, name, ext)
    }
}

/// Split `[U:]NAME[.EXT]` into user, name and extension. User defaults to 0.
pub fn split_cpm_name(spec: &str) -> DiskResult<(u8, String, String)> {
    let (user, rest) = match spec.split_once(':') {
        Some((user, rest)) => {
            let user = user
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|&u| u < 32)
                .ok_or_else(|| DiskError::FileNotFound(spec.to_string()))?;
            (user, rest)
        }
        None => (0, spec),
    };

    let (name, ext) = match rest.rsplit_once('.') {
        Some((name, ext)) => (name, ext),
        None => (rest, ""),
    };

    Ok((user, name.trim().to_uppercase(), ext.trim().to_uppercase()))
}
