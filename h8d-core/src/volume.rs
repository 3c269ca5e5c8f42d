//! Volume trait - the list/resolve/read shape shared by CP/M and HDOS.

use serde::Serialize;
use tracing::warn;

use crate::cpm::{split_cpm_name, CpmVolume};
use crate::error::{DiskError, DiskResult};
use crate::geometry::{DiskFormatKind, DiskGeometry};
use crate::hdos::HdosVolume;
use crate::sector::SectorStore;

/// Directory row in filesystem-neutral form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeEntry {
    pub name: String,
    pub flags: String,
    /// Size in allocation units (records or sectors)
    pub units: usize,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// Why the size could not be worked out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

/// Listed files plus directory-level faults.
#[derive(Debug, Default)]
pub struct VolumeListing {
    pub entries: Vec<VolumeEntry>,
    /// Directory blocks that could not be read
    pub faults: Vec<DiskError>,
}

/// A unit that could not be read while reading a file.
#[derive(Debug)]
pub struct UnitFailure {
    pub unit: u32,
    pub error: DiskError,
}

/// File data gathered unit by unit. Unreadable units are skipped.
#[derive(Debug, Default)]
pub struct FileContents {
    pub name: String,
    pub data: Vec<u8>,
    pub failures: Vec<UnitFailure>,
}

impl FileContents {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read-only view of a mounted filesystem.
pub trait Volume {
    /// Short filesystem name ("CP/M", "HDOS").
    fn filesystem_name(&self) -> &'static str;

    /// Bytes per unit returned by `resolve_file`.
    fn unit_size(&self) -> usize;

    /// List the files on the volume.
    fn list(&self) -> DiskResult<VolumeListing>;

    /// Resolve a filename to its ordered unit numbers.
    fn resolve_file(&self, name: &str) -> DiskResult<Vec<u32>>;

    /// Read one unit.
    fn read_unit(&self, unit: u32) -> DiskResult<Vec<u8>>;

    /// Read a whole file, continuing past unreadable units.
    fn read_file(&self, name: &str) -> DiskResult<FileContents> {
        let units = self.resolve_file(name)?;
        Ok(collect_units(name, &units, self.unit_size(), |unit| {
            self.read_unit(unit)
        }))
    }
}

/// Read `units` in order, recording failures instead of stopping.
pub(crate) fn collect_units<F, B>(name: &str, units: &[u32], unit_size: usize, mut read: F) -> FileContents
where
    F: FnMut(u32) -> DiskResult<B>,
    B: AsRef<[u8]>,
{
    let mut contents = FileContents {
        name: name.to_string(),
        data: Vec::with_capacity(units.len() * unit_size),
        failures: Vec::new(),
    };

    for &unit in units {
        match read(unit) {
            Ok(bytes) => contents.data.extend_from_slice(bytes.as_ref()),
            Err(error) => {
                warn!(file = name, unit, %error, "skipping unreadable unit");
                contents.failures.push(UnitFailure { unit, error });
            }
        }
    }

    contents
}

/// Filesystem selector for `open_volume`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilesystemKind {
    Hdos,
    Cpm {
        geometry: DiskGeometry,
        format: DiskFormatKind,
    },
}

/// Mount a store as the selected filesystem.
pub fn open_volume<'a, S: SectorStore + 'a>(
    store: S,
    kind: FilesystemKind,
) -> DiskResult<Box<dyn Volume + 'a>> {
    match kind {
        FilesystemKind::Hdos => Ok(Box::new(HdosVolume::open(store)?)),
        FilesystemKind::Cpm { geometry, format } => {
            Ok(Box::new(CpmVolume::open(store, geometry, format)?))
        }
    }
}

impl<S: SectorStore> Volume for CpmVolume<S> {
    fn filesystem_name(&self) -> &'static str {
        "CP/M"
    }

    fn unit_size(&self) -> usize {
        crate::cpm::RECORD_SIZE
    }

    fn list(&self) -> DiskResult<VolumeListing> {
        let entries = self
            .list_files()
            .into_iter()
            .map(|file| VolumeEntry {
                name: format!("{}:{}", file.user, file.filename()),
                flags: file.flags,
                units: file.records,
                bytes: file.records * crate::cpm::RECORD_SIZE,
                modified: None,
                fault: None,
            })
            .collect();
        Ok(VolumeListing {
            entries,
            faults: Vec::new(),
        })
    }

    fn resolve_file(&self, name: &str) -> DiskResult<Vec<u32>> {
        let (user, file, ext) = split_cpm_name(name)?;
        CpmVolume::resolve_file(self, user, &file, &ext).map(|resolved| resolved.records)
    }

    fn read_unit(&self, unit: u32) -> DiskResult<Vec<u8>> {
        self.read_record(unit).map(|record| record.to_vec())
    }
}

impl<S: SectorStore> Volume for HdosVolume<S> {
    fn filesystem_name(&self) -> &'static str {
        "HDOS"
    }

    fn unit_size(&self) -> usize {
        crate::sector::SECTOR_SIZE
    }

    fn list(&self) -> DiskResult<VolumeListing> {
        let catalog = self.list_entries(false)?;
        let entries = catalog
            .rows
            .into_iter()
            .map(|row| VolumeEntry {
                name: row.entry.filename(),
                flags: row.entry.flags.to_text(),
                units: row.used_sectors,
                bytes: row.used_sectors * crate::sector::SECTOR_SIZE,
                modified: Some(row.entry.modified.to_string()),
                fault: row.fault.map(|e| e.to_string()),
            })
            .collect();
        Ok(VolumeListing {
            entries,
            faults: catalog.faults,
        })
    }

    fn resolve_file(&self, name: &str) -> DiskResult<Vec<u32>> {
        HdosVolume::resolve_file(self, name).map(|resolved| resolved.sectors)
    }

    fn read_unit(&self, unit: u32) -> DiskResult<Vec<u8>> {
        self.store().read_sector(unit).map(|sector| sector.to_vec())
    }
}
