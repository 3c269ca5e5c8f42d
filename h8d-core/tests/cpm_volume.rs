//! Integration tests for CP/M volumes built sector by sector.

use h8d_core::cpm::{RECORDS_PER_BLOCK, RECORD_SIZE};
use h8d_core::geometry::{DATA_START_SECTOR, H17_SKEW, H37_SKEW, SECTORS_PER_GROUP};
use h8d_core::{
    open_volume, CpmVolume, DiskFormatKind, DiskGeometry, FilesystemKind, MemorySectorStore,
    SectorStore, Volume, SECTOR_SIZE,
};

fn dir_entry(user: u8, name: &[u8; 8], ext: &[u8; 3], extent: u8, rc: u8, blocks: &[u8]) -> [u8; 32] {
    let mut e = [0u8; 32];
    e[0] = user;
    e[1..9].copy_from_slice(name);
    e[9..12].copy_from_slice(ext);
    e[12] = extent;
    e[15] = rc;
    e[16..16 + blocks.len()].copy_from_slice(blocks);
    e
}

/// Physical sector of sector `k` in `block`, worked out from the skew table.
fn sector_of(skew: &[[u32; 4]; 5], block: u8, k: usize) -> u32 {
    let block = block as u32;
    DATA_START_SECTOR + (block / 5) * SECTORS_PER_GROUP + skew[(block % 5) as usize][k]
}

/// Write file record `i` (filled with `i as u8`) into its place on disk.
fn place_records(store: &mut MemorySectorStore, skew: &[[u32; 4]; 5], blocks: &[u8], count: usize) {
    for i in 0..count {
        let block = blocks[i / RECORDS_PER_BLOCK];
        let within = i % RECORDS_PER_BLOCK;
        let sector = sector_of(skew, block, within / 2);

        let mut data = store.read_sector(sector).unwrap();
        let half = (within % 2) * RECORD_SIZE;
        data[half..half + RECORD_SIZE].fill(i as u8);
        store.put_sector(sector, &data);
    }
}

fn write_directory(store: &mut MemorySectorStore, sectors: &[u32], entries: &[[u8; 32]]) {
    let mut directory = vec![0xE5u8; sectors.len() * SECTOR_SIZE];
    for (i, e) in entries.iter().enumerate() {
        directory[i * 32..(i + 1) * 32].copy_from_slice(e);
    }
    for (i, &sector) in sectors.iter().enumerate() {
        store.put_sector(sector, &directory[i * SECTOR_SIZE..(i + 1) * SECTOR_SIZE]);
    }
}

fn big_file_image() -> MemorySectorStore {
    let mut store = MemorySectorStore::blank(400);
    let first: Vec<u8> = (2..18).collect();
    let all: Vec<u8> = (2..20).collect();

    write_directory(
        &mut store,
        &[30, 34],
        &[
            dir_entry(0, b"BIG     ", b"DAT", 0, 128, &first),
            dir_entry(0, b"BIG     ", b"DAT", 1, 10, &[18, 19]),
            dir_entry(0, b"README  ", b"TXT", 0, 1, &[20]),
        ],
    );
    place_records(&mut store, &H17_SKEW, &all, 138);
    place_records(&mut store, &H17_SKEW, &[20], 1);
    store
}

#[test]
fn test_multi_extent_file_reads_in_order() {
    let volume = CpmVolume::open(big_file_image(), DiskGeometry::h17_sssd40(), DiskFormatKind::H17)
        .unwrap();

    let file = volume.resolve_file(0, "BIG", "DAT").unwrap();
    assert_eq!(file.extents, 2);
    assert_eq!(file.records.len(), 138);

    // block 18 -> group 3, row 3 -> 90 + 18 = sector 108
    assert_eq!(file.records[128], 216);
    assert_eq!(file.records[129], 217);

    let contents = volume.read_file(0, "BIG", "DAT").unwrap();
    assert!(contents.is_complete());
    assert_eq!(contents.data.len(), 138 * RECORD_SIZE);
    for (i, record) in contents.data.chunks(RECORD_SIZE).enumerate() {
        assert!(record.iter().all(|&b| b == i as u8), "record {} out of place", i);
    }
}

#[test]
fn test_read_record_matches_sector_halves() {
    let store = big_file_image();
    let volume = CpmVolume::open(&store, DiskGeometry::h17_sssd40(), DiskFormatKind::H17).unwrap();

    let file = volume.resolve_file(0, "BIG", "DAT").unwrap();
    for &record in file.records.iter().take(16) {
        let sector = store.read_sector(record / 2).unwrap();
        let start = (record as usize % 2) * RECORD_SIZE;
        assert_eq!(volume.read_record(record).unwrap()[..], sector[start..start + RECORD_SIZE]);
    }
}

#[test]
fn test_list_files() {
    let volume = CpmVolume::open(big_file_image(), DiskGeometry::h17_sssd40(), DiskFormatKind::H17)
        .unwrap();

    let files = volume.list_files();
    assert_eq!(files.len(), 2);
    assert_eq!((files[0].filename(), files[0].records, files[0].extents), ("BIG.DAT".to_string(), 138, 2));
    assert_eq!(files[1].filename(), "README.TXT");

    let json = serde_json::to_value(&files).unwrap();
    assert_eq!(json[0]["name"], "BIG");
    assert_eq!(json[0]["records"], 138);
}

#[test]
fn test_h37_directory_and_skew() {
    let mut store = MemorySectorStore::blank(1600);
    let mut entries = vec![[0xE5u8; 32]; 20];
    entries[17] = dir_entry(2, b"LATE    ", b"COM", 0, 4, &[6]);
    write_directory(&mut store, &[30, 33, 36, 39], &entries);
    place_records(&mut store, &H37_SKEW, &[6], 4);

    let volume = CpmVolume::open(&store, DiskGeometry::h37_dsdd80(), DiskFormatKind::H37).unwrap();
    assert_eq!(volume.list_entries().len(), 32);

    let file = volume.resolve_file(2, "LATE", "COM").unwrap();
    // block 6 -> group 1, row 1 -> 50 + 12 = sector 62
    assert_eq!(file.records[..2], [124, 125]);

    let contents = volume.read_file(2, "late", "com").unwrap();
    assert_eq!(contents.data.len(), 4 * RECORD_SIZE);
    assert!(contents.data[3 * RECORD_SIZE..].iter().all(|&b| b == 3));
}

#[test]
fn test_short_image_reports_failed_records() {
    let mut bytes = big_file_image().into_bytes();
    // cut the image inside group 3 (sectors 90..110)
    bytes.truncate(100 * SECTOR_SIZE);
    let volume = CpmVolume::open(
        MemorySectorStore::new(bytes),
        DiskGeometry::h17_sssd40(),
        DiskFormatKind::H17,
    )
    .unwrap();

    let contents = volume.read_file(0, "BIG", "DAT").unwrap();
    assert!(!contents.is_complete());
    assert_eq!(contents.data.len() + contents.failures.len() * RECORD_SIZE, 138 * RECORD_SIZE);
    assert!(contents.failures.iter().all(|f| f.unit >= 200));
}

#[test]
fn test_cpm_through_volume_trait() {
    let volume = open_volume(
        big_file_image(),
        FilesystemKind::Cpm {
            geometry: DiskGeometry::h17_sssd40(),
            format: DiskFormatKind::H17,
        },
    )
    .unwrap();

    assert_eq!(volume.filesystem_name(), "CP/M");
    let names: Vec<String> = volume.list().unwrap().entries.into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["0:BIG.DAT", "0:README.TXT"]);

    let contents = volume.read_file("0:README.TXT").unwrap();
    assert_eq!(contents.data, vec![0u8; RECORD_SIZE]);
}

#[test]
fn test_custom_geometry_bounds_blocks() {
    // 40 sectors: the directory fits, block 20 (sectors 110..) does not
    let geometry = DiskGeometry {
        tracks: 4,
        ..DiskGeometry::h17_sssd40()
    };
    let volume = CpmVolume::open(big_file_image(), geometry, DiskFormatKind::H17).unwrap();

    assert!(matches!(
        volume.resolve_file(0, "README", "TXT"),
        Err(h8d_core::DiskError::BlockOutOfRange {
            block: 20,
            total: 40,
            ..
        })
    ));
}
