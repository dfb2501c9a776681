//! CLI command implementations
//!
//! Every command works on a flash image file loaded into a [`DummyFlash`].
//! Commands that modify the image only write it back when they succeed, so
//! a failed reflash leaves the file untouched.

pub mod direct;
pub mod reflash;
pub mod select;
pub mod table;

use crate::cli::TableArgs;
use reflasher_core::partition::{PartitionTable, MAX_TABLE_LEN};
use reflasher_dummy::{DummyConfig, DummyFlash};
use std::fs;
use std::path::Path;

/// Erase granularity of the emulated flash
pub const SECTOR_SIZE: usize = 4096;

/// Load a flash image file into an emulated flash device
pub fn load_image(path: &Path) -> Result<DummyFlash, Box<dyn std::error::Error>> {
    let data = fs::read(path)?;
    let size = u32::try_from(data.len())
        .map_err(|_| format!("Image {:?} is larger than 4 GiB", path))?;
    if data.is_empty() || data.len() % SECTOR_SIZE != 0 {
        return Err(format!(
            "Image size {} is not a multiple of the {} byte sector",
            size, SECTOR_SIZE
        )
        .into());
    }
    log::info!("Loaded {} bytes ({}) from {:?}", size, format_size(size), path);

    Ok(DummyFlash::with_data(
        DummyConfig {
            size: data.len(),
            sector_size: SECTOR_SIZE,
        },
        &data,
    ))
}

/// Write the emulated flash back to the image file
pub fn save_image(flash: &DummyFlash, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(path, flash.data())?;
    log::info!("Wrote {} bytes to {:?}", flash.data().len(), path);
    Ok(())
}

/// Load the partition table from a TOML file or from the image
pub fn load_table(
    args: &TableArgs,
    image: Option<&[u8]>,
) -> Result<PartitionTable, Box<dyn std::error::Error>> {
    if let Some(path) = &args.table {
        let table = PartitionTable::from_toml_file(path)?;
        log::info!("Loaded {} partitions from {:?}", table.len(), path);
        return Ok(table);
    }

    let image = image.ok_or("Partition table source required (--table or --image)")?;
    let start = args.offset as usize;
    if start >= image.len() {
        return Err(format!(
            "Table offset {:#X} is beyond the {} byte image",
            args.offset,
            image.len()
        )
        .into());
    }
    let end = image.len().min(start + MAX_TABLE_LEN);
    let table = PartitionTable::from_bytes(&image[start..end])?;
    log::info!(
        "Found {} partitions at offset {:#X}",
        table.len(),
        args.offset
    );
    Ok(table)
}

/// Reject a running address no application partition contains
///
/// The selector panics on such a table.
pub fn check_running(
    table: &PartitionTable,
    running: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    match table.containing(running) {
        Some(partition) if partition.kind.is_app() => Ok(()),
        _ => Err(format!(
            "No application partition contains running address {:#010X}",
            running
        )
        .into()),
    }
}

/// Format a byte count as B, KiB or MiB
pub fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
