//! H8D CLI - Examine Heathkit H8/H89 disk images from the command line.
//!
//! Usage:
//!   h8d stats <image>
//!   h8d hdos <image> <stats|dir|type|copy>
//!   h8d cpm <image> [--format h17|h37] <dir|entries|type|copy>
//!   h8d unpack <source.imd> <dest>
//!
//! Examples:
//!   h8d hdos games.h8d dir --details     # HDOS catalog with dates and sizes
//!   h8d cpm cpm22.h8d type 0:README.TXT  # Show a CP/M text file
//!   h8d cpm disk.imd --format h37 dir    # IMD containers are unpacked on load
//!   h8d unpack disk.imd disk.h8d         # Write the flat sector image

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use h8d_core::image::ImageSource;
use h8d_core::{
    load_store, CpmVolume, DiskFormatKind, DiskGeometry, HdosVolume, ImdContainer, LoadedImage,
    SectorStore, Volume, SECTOR_SIZE,
};

/// CP/M end-of-file marker in text files.
const CPM_EOF: u8 = 0x1A;

/// Heathkit H8/H89 disk image examiner
#[derive(Parser, Debug)]
#[command(name = "h8d")]
#[command(about = "Examine Heathkit H8/H89 disk images")]
struct Args {
    /// Log directory and chain walking
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print listings as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show image size and sector count
    Stats { image: PathBuf },

    /// Interpret the image as an HDOS disk
    Hdos {
        image: PathBuf,

        #[command(subcommand)]
        action: HdosAction,
    },

    /// Interpret the image as a CP/M disk
    Cpm {
        image: PathBuf,

        /// Media family (selects skew table and directory sectors)
        #[arg(long, value_enum, default_value_t = Format::H17)]
        format: Format,

        /// JSON geometry file overriding the format's default geometry
        #[arg(long)]
        geometry: Option<PathBuf>,

        #[command(subcommand)]
        action: CpmAction,
    },

    /// Unpack an ImageDisk container into a flat sector image
    Unpack { source: PathBuf, dest: PathBuf },
}

#[derive(Subcommand, Debug)]
enum HdosAction {
    /// Show the volume label and free space
    Stats,
    /// List files on disk
    #[command(alias = "cat")]
    Dir {
        /// Include create date, project, version and allocated sectors
        #[arg(long)]
        details: bool,
    },
    /// Display contents of a file
    Type { name: String },
    /// Copy a file to the host filesystem
    Copy { name: String, dest: PathBuf },
}

#[derive(Subcommand, Debug)]
enum CpmAction {
    /// List files on disk (extents merged)
    Dir,
    /// List raw directory entries with their record maps
    Entries,
    /// Display contents of a file ([U:]NAME.EXT)
    Type { name: String },
    /// Copy a file to the host filesystem ([U:]NAME.EXT)
    Copy { name: String, dest: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    H17,
    H37,
}

impl From<Format> for DiskFormatKind {
    fn from(format: Format) -> Self {
        match format {
            Format::H17 => DiskFormatKind::H17,
            Format::H37 => DiskFormatKind::H37,
        }
    }
}

fn init_logging(verbose: bool) {
    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Stats { image } => {
            let loaded = load_store(&image)?;
            print_stats(&image, &loaded);
        }
        Command::Hdos { image, action } => {
            let loaded = load_store(&image)?;
            let volume = HdosVolume::open(loaded.store)?;
            run_hdos(&volume, action, args.json)?;
        }
        Command::Cpm {
            image,
            format,
            geometry,
            action,
        } => {
            let kind = DiskFormatKind::from(format);
            let geometry = match geometry {
                Some(path) => DiskGeometry::from_json_path(path)?,
                None => match kind {
                    DiskFormatKind::H17 => DiskGeometry::h17_sssd40(),
                    DiskFormatKind::H37 => DiskGeometry::h37_dsdd80(),
                },
            };
            let loaded = load_store(&image)?;
            let volume = CpmVolume::open(loaded.store, geometry, kind)?;
            run_cpm(&volume, action, args.json)?;
        }
        Command::Unpack { source, dest } => {
            let raw = std::fs::read(&source)?;
            let container = ImdContainer::parse(&raw)?;
            println!("{}", container.comment);
            std::fs::write(&dest, &container.image)?;
            eprintln!(
                "Wrote {} sectors from {} tracks to {}",
                container.sector_count(),
                container.tracks.len(),
                dest.display()
            );
        }
    }

    Ok(())
}

fn print_stats(path: &Path, loaded: &LoadedImage) {
    let count = loaded.store.sector_count();
    println!("Image: {}", path.display());
    match &loaded.source {
        ImageSource::Raw => {}
        ImageSource::ImageDisk { comment } => println!("ImageDisk: {}", comment.trim_end()),
        ImageSource::Archive { member, .. } => println!("Archive member: {}", member),
    }
    println!("Size: {} ({}K)", loaded.size, loaded.size / 1024);
    let last = count.saturating_sub(1);
    println!("Last sector: {:04X}H ({})", last, last);
    if loaded.size % SECTOR_SIZE as u64 != 0 {
        println!("Warning: image ends with a partial sector");
    }
}

fn run_hdos<S: SectorStore>(
    volume: &HdosVolume<S>,
    action: HdosAction,
    as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        HdosAction::Stats => {
            let label = volume.label();
            println!("Label: {}", label.text);
            println!("Serial number: {}", label.serial);
            println!("Init date: {}", label.init_date);
            println!(
                "First directory sector: 0x{:02X} ({})",
                label.directory_sector, label.directory_sector
            );
            println!("GRT sector: 0x{:02X} ({})", label.grt_sector, label.grt_sector);
            println!("Sectors per group: {}", label.sectors_per_group);
            println!("INIT.ABS version: 0x{:02X}", label.version);
            println!("Number of sectors: {}", label.total_sectors);
            println!("Sector size: {}", label.sector_size);
            println!("Sectors per track: {}", label.sectors_per_track);
            if label.version >= h8d_core::hdos::EXTENDED_LABEL_VERSION {
                println!("Layout: {}", label.layout());
            }
            println!("Free sectors: {}", volume.free_sector_count()?);
        }
        HdosAction::Dir { details } => {
            let catalog = volume.list_entries(details)?;
            let rows = &catalog.rows;
            if as_json {
                let rows: Vec<_> = rows
                    .iter()
                    .map(|row| {
                        json!({
                            "name": row.entry.filename(),
                            "flags": row.entry.flags.to_text().trim(),
                            "created": row.entry.created.to_string(),
                            "modified": row.entry.modified.to_string(),
                            "project": row.entry.project,
                            "version": row.entry.version,
                            "usedSectors": row.used_sectors,
                            "allocatedSectors": row.allocated_sectors,
                            "fault": row.fault.as_ref().map(|e| e.to_string()),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            if details {
                println!("Name          Flags  Created      Modified     Proj Ver  Used Alloc");
            } else {
                println!("Name          Flags  Modified      Used");
            }
            for row in rows {
                let e = &row.entry;
                if let Some(fault) = &row.fault {
                    println!("{:<8}.{:<3}  {}   {}", e.name, e.extension, e.flags.to_text(), fault);
                    continue;
                }
                if details {
                    println!(
                        "{:<8}.{:<3}  {}   {}  {}  {:>4} {:>3} {:>5} {:>5}",
                        e.name,
                        e.extension,
                        e.flags.to_text(),
                        e.created,
                        e.modified,
                        e.project,
                        e.version,
                        row.used_sectors,
                        row.allocated_sectors.unwrap_or(0)
                    );
                } else {
                    println!(
                        "{:<8}.{:<3}  {}   {}  {:>5}",
                        e.name,
                        e.extension,
                        e.flags.to_text(),
                        e.modified,
                        row.used_sectors
                    );
                }
            }
            println!();
            println!("{} files, {} free sectors", rows.len(), volume.free_sector_count()?);
            for fault in &catalog.faults {
                eprintln!("Directory incomplete: {}", fault);
            }
        }
        HdosAction::Type { name } => type_file(volume, &name, None)?,
        HdosAction::Copy { name, dest } => copy_file(volume, &name, &dest)?,
    }
    Ok(())
}

fn run_cpm<S: SectorStore>(
    volume: &CpmVolume<S>,
    action: CpmAction,
    as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CpmAction::Dir => {
            let files = volume.list_files();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&files)?);
                return Ok(());
            }

            println!("User Name          Flags Extents Records     Size");
            for file in &files {
                println!(
                    "{:>4} {:<8}.{:<3}  {}   {:>5}   {:>5} {:>7}K",
                    file.user,
                    file.name,
                    file.extension,
                    file.flags,
                    file.extents,
                    file.records,
                    (file.records * h8d_core::cpm::RECORD_SIZE).div_ceil(1024)
                );
            }
        }
        CpmAction::Entries => {
            if as_json {
                let rows: Vec<_> = volume
                    .list_entries()
                    .iter()
                    .map(|e| {
                        json!({
                            "slot": e.slot,
                            "kind": e.kind(),
                            "user": e.user,
                            "name": e.filename(),
                            "extent": e.extent,
                            "flags": e.attributes.to_text().trim(),
                            "recordCount": e.record_count,
                            "blocks": e.blocks,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            println!("Name          Extent Flags User Records");
            for entry in volume.list_entries() {
                if !entry.is_normal() {
                    println!("[{:>2}] {:?}", entry.slot, entry.kind());
                    continue;
                }
                println!(
                    "{:<8}.{:<3}    {:2}    {}  {:3}    {:4} Blocks: {:02X?}",
                    entry.name(),
                    entry.extension(),
                    entry.extent,
                    entry.attributes.to_text(),
                    entry.user,
                    entry.record_count,
                    entry.blocks
                );
                match volume.extent_records(entry) {
                    Ok(records) => {
                        let map: Vec<String> = records
                            .iter()
                            .map(|r| format!("{}:{}", r / 2, r % 2))
                            .collect();
                        println!("{}", map.join(" "));
                    }
                    Err(e) => println!("{}", e),
                }
                println!();
            }
        }
        CpmAction::Type { name } => type_file(volume, &name, Some(CPM_EOF))?,
        CpmAction::Copy { name, dest } => copy_file(volume, &name, &dest)?,
    }
    Ok(())
}

/// Print a file to stdout, stopping at `eof` when given.
fn type_file(
    volume: &dyn Volume,
    name: &str,
    eof: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = volume.read_file(name)?;
    report_failures(volume, &contents.failures);

    let end = eof
        .and_then(|eof| contents.data.iter().position(|&b| b == eof))
        .unwrap_or(contents.data.len());
    std::io::stdout().write_all(&contents.data[..end])?;
    println!();
    Ok(())
}

fn copy_file(volume: &dyn Volume, name: &str, dest: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let contents = volume.read_file(name)?;
    report_failures(volume, &contents.failures);
    std::fs::write(dest, &contents.data)?;
    eprintln!("Copied {} bytes to {}", contents.data.len(), dest.display());
    Ok(())
}

fn report_failures(volume: &dyn Volume, failures: &[h8d_core::volume::UnitFailure]) {
    let unit = if volume.unit_size() == SECTOR_SIZE {
        "sector"
    } else {
        "record"
    };
    for failure in failures {
        eprintln!("Could not read {} {}: {}", unit, failure.unit, failure.error);
    }
}
