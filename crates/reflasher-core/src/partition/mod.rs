//! Partition table support
//!
//! This module describes the device's partition table and picks staging
//! partitions out of it. Tables can be:
//!
//! - Built programmatically with [`PartitionTable::push`]
//! - Parsed from the binary on-flash format
//! - Loaded from TOML files (`std` only)
//!
//! # Selecting a staging partition
//!
//! ```ignore
//! let selector = PartitionSelector::new(&table, running_address);
//! let staging = selector.select(&destination, None)?;
//! ```

mod binary;
mod select;
mod table;
mod types;

#[cfg(feature = "std")]
mod toml;

pub use binary::{PartitionTableError, DEFAULT_TABLE_OFFSET, ENTRY_SIZE, MAX_TABLE_LEN};
pub use select::PartitionSelector;
pub use table::{PartitionTable, MAX_PARTITIONS};
pub use types::*;

#[cfg(feature = "std")]
pub use toml::{parse_number, parse_size};
