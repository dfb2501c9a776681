//! Table command implementation

use crate::cli::TableArgs;
use reflasher_core::partition::{AppSubtype, PartitionFlags, PartitionKind, PartitionTable};
use std::path::Path;

/// Run the table command
pub fn cmd_table(image: Option<&Path>, args: &TableArgs) -> Result<(), Box<dyn std::error::Error>> {
    let data = image.map(std::fs::read).transpose()?;
    let table = super::load_table(args, data.as_deref())?;
    print_table(&table);
    Ok(())
}

/// Print a partition table in human-readable format
pub fn print_table(table: &PartitionTable) {
    println!("Partition Table");
    println!("===============");
    println!("OTA slots: {}", table.ota_slot_count());

    println!("\nPartitions ({}):", table.len());
    println!(
        "{:<16} {:<12} {:>10} {:>10} {:>10} {:>4} {:>4}",
        "Label", "Type", "Start", "End", "Size", "RO", "Enc"
    );
    println!("{:-<72}", "");

    for partition in table {
        let end = partition.region().end().saturating_sub(1);
        println!(
            "{:<16} {:<12} {:#010X} {:#010X} {:>10} {:>4} {:>4}",
            if partition.label.is_empty() {
                "-"
            } else {
                partition.label.as_str()
            },
            kind_name(&partition.kind),
            partition.address,
            end,
            super::format_size(partition.size),
            if partition.is_readonly() { "yes" } else { "-" },
            if partition.flags.contains(PartitionFlags::ENCRYPTED) {
                "yes"
            } else {
                "-"
            },
        );
    }
}

/// Short type/subtype name, e.g. `app/ota_1`
pub fn kind_name(kind: &PartitionKind) -> String {
    match kind {
        PartitionKind::App(AppSubtype::Factory) => "app/factory".to_string(),
        PartitionKind::App(AppSubtype::Test) => "app/test".to_string(),
        PartitionKind::App(AppSubtype::Ota(slot)) => format!("app/ota_{}", slot),
        PartitionKind::App(AppSubtype::Other(subtype)) => format!("app/{:#04x}", subtype),
        PartitionKind::Data(subtype) => format!("data/{:#04x}", subtype),
        PartitionKind::Custom(kind, subtype) => format!("{:#04x}/{:#04x}", kind, subtype),
    }
}
