//! HDOS volume: label, GRT and the chained directory.

use std::collections::HashSet;
use std::ops::ControlFlow;

use tracing::{debug, warn};

use super::entry::HdosDirEntry;
use super::grt::Grt;
use super::label::{HdosLabel, LABEL_SECTOR};
use crate::error::{DiskError, DiskResult};
use crate::sector::{SectorStore, SECTOR_SIZE};
use crate::volume::{collect_units, FileContents};

/// Offset of the next-block vector in a 512-byte directory block.
pub const CHAIN_VECTOR_OFFSET: usize = 506;

/// A directory row with its chain-derived sizes.
#[derive(Debug)]
pub struct HdosListing {
    pub entry: HdosDirEntry,
    /// Sectors in use, last group counted up to its last sector
    pub used_sectors: usize,
    /// Sectors allocated, last group counted in full (details only)
    pub allocated_sectors: Option<usize>,
    /// Broken cluster chain; the sizes are zero/None when set
    pub fault: Option<DiskError>,
}

/// Directory rows plus the faults that cut the directory chain short.
#[derive(Debug, Default)]
pub struct HdosCatalog {
    pub rows: Vec<HdosListing>,
    pub faults: Vec<DiskError>,
}

/// A file resolved to its sectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdosFile {
    pub entry: HdosDirEntry,
    pub sectors: Vec<u32>,
}

/// Result of walking the directory chain.
#[derive(Debug, Default)]
pub struct DirectoryWalk {
    /// In-use entries in chain order
    pub entries: Vec<HdosDirEntry>,
    /// Directory blocks visited
    pub blocks: Vec<u32>,
    /// Read failures that cut the chain short
    pub faults: Vec<DiskError>,
}

/// An HDOS volume.
///
/// Label and GRT are read once at open; directory blocks and file data are
/// read on demand.
pub struct HdosVolume<S: SectorStore> {
    store: S,
    label: HdosLabel,
    grt: Grt,
    warnings: Vec<DiskError>,
}

impl<S: SectorStore> HdosVolume<S> {
    /// Read the label and the GRT.
    pub fn open(store: S) -> DiskResult<Self> {
        let label_sector = store
            .read_sector(LABEL_SECTOR)
            .map_err(|e| DiskError::directory(LABEL_SECTOR, e))?;
        let label = HdosLabel::parse(&label_sector);

        let mut warnings = Vec::new();
        if label.suspect {
            warn!(label = %label.text.escape_debug(), "this disk has a strange label");
            warnings.push(DiskError::SuspectVolumeLabel(label.text.clone()));
        }

        let grt_index = label.grt_sector as u32;
        let grt = store
            .read_sector(grt_index)
            .map_err(|e| DiskError::directory(grt_index, e))?;

        debug!(
            directory = label.directory_sector,
            grt = label.grt_sector,
            spg = label.sectors_per_group,
            version = label.version,
            "HDOS label loaded"
        );

        Ok(Self {
            store,
            label,
            grt: Grt::new(grt),
            warnings,
        })
    }

    pub fn label(&self) -> &HdosLabel {
        &self.label
    }

    pub fn grt(&self) -> &Grt {
        &self.grt
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Non-fatal problems found at open.
    pub fn warnings(&self) -> &[DiskError] {
        &self.warnings
    }

    /// Sectors on the free list.
    pub fn free_sector_count(&self) -> DiskResult<usize> {
        self.grt.free_sector_count(self.label.sectors_per_group)
    }

    /// Sectors a directory entry uses, last group cut to its last sector.
    pub fn used_sectors(&self, entry: &HdosDirEntry) -> DiskResult<Vec<u32>> {
        self.grt.sectors(
            entry.first_cluster,
            entry.last_cluster,
            entry.last_sector,
            self.label.sectors_per_group,
        )
    }

    /// Sectors a directory entry has allocated, whole groups.
    pub fn allocated_sectors(&self, entry: &HdosDirEntry) -> DiskResult<Vec<u32>> {
        self.grt.sectors(
            entry.first_cluster,
            entry.last_cluster,
            self.label.sectors_per_group,
            self.label.sectors_per_group,
        )
    }

    /// Visit directory blocks along the chain until it ends or `visit` breaks.
    ///
    /// An unreadable block ends the walk and is returned as a fault. A chain
    /// that loops, or is longer than the disk, is corrupt.
    fn walk_blocks<F>(&self, mut visit: F) -> DiskResult<Vec<DiskError>>
    where
        F: FnMut(u32, Vec<HdosDirEntry>) -> ControlFlow<()>,
    {
        let limit = (self.label.total_sectors as u32).max(self.store.sector_count());
        let mut seen = HashSet::new();
        let mut faults = Vec::new();
        let mut sector = self.label.directory_sector as u32;

        while sector != 0 {
            if !seen.insert(sector) || seen.len() as u32 > limit {
                return Err(DiskError::corrupt_chain(
                    "directory",
                    format!("block {} reached twice or chain exceeds the disk", sector),
                ));
            }

            let block = match self.store.read_sector_pair(sector) {
                Ok(block) => block,
                Err(e) => {
                    warn!(sector, error = %e, "cannot read directory block");
                    faults.push(DiskError::directory(sector, e));
                    break;
                }
            };

            let entries = HdosDirEntry::parse_block(&block[..CHAIN_VECTOR_OFFSET]);
            debug!(sector, entries = entries.len(), "HDOS directory block");
            if visit(sector, entries).is_break() {
                break;
            }

            let vector = &block[CHAIN_VECTOR_OFFSET..2 * SECTOR_SIZE];
            sector = u16::from_le_bytes([vector[4], vector[5]]) as u32;
        }

        Ok(faults)
    }

    /// Walk the whole directory chain.
    pub fn walk_directory(&self) -> DiskResult<DirectoryWalk> {
        let mut blocks = Vec::new();
        let mut entries = Vec::new();
        let faults = self.walk_blocks(|sector, block_entries| {
            blocks.push(sector);
            entries.extend(block_entries);
            ControlFlow::Continue(())
        })?;

        Ok(DirectoryWalk {
            entries,
            blocks,
            faults,
        })
    }

    /// Directory rows with used (and, with `details`, allocated) sector counts.
    ///
    /// A file whose cluster chain is broken keeps its row with the error in
    /// `fault`; the other rows are unaffected.
    pub fn list_entries(&self, details: bool) -> DiskResult<HdosCatalog> {
        let walk = self.walk_directory()?;
        let rows = walk
            .entries
            .into_iter()
            .map(|entry| self.listing(entry, details))
            .collect();

        Ok(HdosCatalog {
            rows,
            faults: walk.faults,
        })
    }

    fn listing(&self, entry: HdosDirEntry, details: bool) -> HdosListing {
        let sizes = self.used_sectors(&entry).and_then(|used| {
            let allocated = if details {
                Some(self.allocated_sectors(&entry)?.len())
            } else {
                None
            };
            Ok((used.len(), allocated))
        });

        match sizes {
            Ok((used_sectors, allocated_sectors)) => HdosListing {
                entry,
                used_sectors,
                allocated_sectors,
                fault: None,
            },
            Err(e) => {
                warn!(file = %entry.filename(), error = %e, "cannot size file");
                HdosListing {
                    entry,
                    used_sectors: 0,
                    allocated_sectors: None,
                    fault: Some(e),
                }
            }
        }
    }

    /// Resolve `NAME.EXT` to its sectors (first match in chain order).
    pub fn resolve_file(&self, name: &str) -> DiskResult<HdosFile> {
        let mut found = None;
        self.walk_blocks(|_, entries| match entries.into_iter().find(|e| e.matches(name)) {
            Some(entry) => {
                found = Some(entry);
                ControlFlow::Break(())
            }
            None => ControlFlow::Continue(()),
        })?;

        let entry = found.ok_or_else(|| DiskError::FileNotFound(name.to_string()))?;
        let sectors = self.used_sectors(&entry)?;
        debug!(file = %entry.filename(), sectors = sectors.len(), "HDOS file resolved");
        Ok(HdosFile { entry, sectors })
    }

    /// Read a file's sectors, skipping (and reporting) unreadable ones.
    pub fn read_file(&self, name: &str) -> DiskResult<FileContents> {
        let file = self.resolve_file(name)?;
        Ok(collect_units(
            &file.entry.filename(),
            &file.sectors,
            SECTOR_SIZE,
            |sector| self.store.read_sector(sector),
        ))
    }
}
