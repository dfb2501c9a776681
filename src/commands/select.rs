//! Select command implementation

use crate::cli::TableArgs;
use reflasher_core::partition::PartitionSelector;
use reflasher_core::Region;
use std::path::Path;

/// Run the select command
pub fn cmd_select(
    image: Option<&Path>,
    args: &TableArgs,
    dest: Region,
    running: u32,
    after: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = image.map(std::fs::read).transpose()?;
    let table = super::load_table(args, data.as_deref())?;
    super::check_running(&table, running)?;

    let after = match after {
        Some(label) => Some(
            table
                .find_by_label(label)
                .ok_or_else(|| format!("No partition labelled '{}'", label))?,
        ),
        None => None,
    };

    let selector = PartitionSelector::new(&table, running);
    println!("Running:     {}", selector.running());

    let target = selector.select(&dest, after)?;
    println!("Destination: {}", dest);
    println!(
        "Storage:     {} ({})",
        target,
        super::format_size(target.size)
    );
    if dest.size > target.size {
        log::warn!(
            "Destination of {} does not fit the storage partition of {}",
            super::format_size(dest.size),
            super::format_size(target.size)
        );
    }
    Ok(())
}
