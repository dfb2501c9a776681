//! reflasher - firmware self-reflash engine
//!
//! Host front end for the reflasher crates. A flash image file stands in for
//! the device's flash chip:
//!
//! - `table` shows the partition table stored in the image (or a TOML file)
//! - `select` shows which storage partition a transfer would stage through
//! - `reflash` downloads images over HTTP(S), stages them in a storage
//!   partition and copies them into place
//! - `direct` copies one region of the image into another
//!
//! Commands that modify the image only write it back when they succeed.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger, RUST_LOG still overrides the verbosity flags
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli::log_filter(cli.verbose)),
    )
    .init();

    match cli.command {
        Commands::Table { image, table } => commands::table::cmd_table(image.as_deref(), &table),
        Commands::Select {
            image,
            table,
            dest,
            running,
            after,
        } => commands::select::cmd_select(
            image.as_deref(),
            &table,
            dest,
            running,
            after.as_deref(),
        ),
        Commands::Reflash {
            image,
            table,
            running,
            stage,
            target,
        } => commands::reflash::cmd_reflash(&image, &table, running, &stage, target.as_deref()),
        Commands::Direct {
            image,
            src,
            dest,
            size,
        } => commands::direct::cmd_direct(&image, src, dest, size),
    }
}
