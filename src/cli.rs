//! CLI argument parsing

use clap::{Parser, Subcommand};
use reflasher_core::partition::DEFAULT_TABLE_OFFSET;
use reflasher_core::Region;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse `ADDR:SIZE` into a region (both parts hex or decimal)
pub fn parse_region(s: &str) -> Result<Region, String> {
    let (addr, size) = s
        .split_once(':')
        .ok_or_else(|| format!("Expected ADDR:SIZE, got '{}'", s))?;
    let region = Region::new(parse_hex_u32(addr.trim())?, parse_hex_u32(size.trim())?);
    if region.end() > u64::from(u32::MAX) + 1 {
        return Err(format!("Region {} runs past the 32-bit address space", s));
    }
    Ok(region)
}

/// One reflash stage: where to fetch an image and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// http:// or https:// URL of the image
    pub url: String,
    /// Destination region
    pub destination: Region,
}

/// Parse `URL@ADDR:SIZE`
pub fn parse_stage(s: &str) -> Result<Stage, String> {
    // URLs may contain '@' (userinfo), the region never does
    let (url, region) = s
        .rsplit_once('@')
        .ok_or_else(|| format!("Expected URL@ADDR:SIZE, got '{}'", s))?;
    if url.is_empty() {
        return Err(format!("Missing URL in stage '{}'", s));
    }
    Ok(Stage {
        url: url.to_string(),
        destination: parse_region(region)?,
    })
}

/// Default log filter for a `-v` count
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[derive(Parser)]
#[command(name = "reflasher")]
#[command(author, version, about = "Firmware self-reflash engine", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where to read the partition table from
#[derive(clap::Args, Debug, Clone)]
pub struct TableArgs {
    /// Partition table file (TOML format), overrides the table in the image
    #[arg(long)]
    pub table: Option<PathBuf>,

    /// Offset of the binary partition table inside the image
    #[arg(long, value_parser = parse_hex_u32, default_value_t = DEFAULT_TABLE_OFFSET)]
    pub offset: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the partition table of a flash image or TOML file
    Table {
        /// Flash image file
        #[arg(short, long, required_unless_present = "table")]
        image: Option<PathBuf>,

        #[command(flatten)]
        table: TableArgs,
    },

    /// Pick the storage partition for a destination region
    Select {
        /// Flash image file holding the partition table
        #[arg(short, long, required_unless_present = "table")]
        image: Option<PathBuf>,

        #[command(flatten)]
        table: TableArgs,

        /// Destination region (ADDR:SIZE)
        #[arg(long, value_parser = parse_region)]
        dest: Region,

        /// Address inside the running application
        #[arg(long, value_parser = parse_hex_u32)]
        running: u32,

        /// Start the search after this partition (label)
        #[arg(long)]
        after: Option<String>,
    },

    /// Download images and copy them into place, one stage after another
    Reflash {
        /// Flash image file, updated in place on success
        #[arg(short, long)]
        image: PathBuf,

        #[command(flatten)]
        table: TableArgs,

        /// Address inside the running application
        #[arg(long, value_parser = parse_hex_u32)]
        running: u32,

        /// Image to fetch and its destination (URL@ADDR:SIZE), repeatable
        #[arg(long, value_parser = parse_stage, required = true)]
        stage: Vec<Stage>,

        /// Stage through this partition (label) instead of selecting one
        #[arg(long)]
        target: Option<String>,
    },

    /// Copy one flash region into another
    Direct {
        /// Flash image file, updated in place on success
        #[arg(short, long)]
        image: PathBuf,

        /// Source region (ADDR:SIZE)
        #[arg(long, value_parser = parse_region)]
        src: Region,

        /// Destination region (ADDR:SIZE)
        #[arg(long, value_parser = parse_region)]
        dest: Region,

        /// Bytes to copy (default: the source size)
        #[arg(long, value_parser = parse_hex_u32)]
        size: Option<u32>,
    },
}
