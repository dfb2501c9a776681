//! Binary partition table parsing
//!
//! The on-flash table is a sequence of 32-byte little-endian entries:
//!
//! ```text
//! 0x00  magic    [0xAA, 0x50]
//! 0x02  type     u8
//! 0x03  subtype  u8
//! 0x04  offset   u32
//! 0x08  size     u32
//! 0x0C  label    [u8; 16], NUL padded
//! 0x1C  flags    u32
//! ```
//!
//! A row starting with `0xEB 0xEB` holds an MD5 digest of the preceding
//! entries and is skipped; a row starting with `0xFF 0xFF` (erased flash)
//! terminates the table.

use core::fmt;

use super::table::PartitionTable;
use super::types::{truncate_label, Partition, PartitionFlags, PartitionKind, LABEL_LEN};

/// Default flash offset of the partition table
pub const DEFAULT_TABLE_OFFSET: u32 = 0x8000;

/// Maximum length of the partition table in bytes
pub const MAX_TABLE_LEN: usize = 0xC00;

/// Size of a single entry
pub const ENTRY_SIZE: usize = 32;

const ENTRY_MAGIC: [u8; 2] = [0xAA, 0x50];
const MD5_MAGIC: [u8; 2] = [0xEB, 0xEB];
const END_MAGIC: [u8; 2] = [0xFF, 0xFF];

/// Errors that can occur when reading a partition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionTableError {
    /// An entry did not start with a known magic
    InvalidMagic {
        /// Byte offset of the entry within the table
        offset: usize,
    },
    /// The data ended in the middle of an entry
    Truncated,
    /// More entries than the table can hold
    TooManyEntries,
    /// Two partitions overlap
    OverlappingPartitions,
    /// Failed to parse a textual table description
    ParseError,
    /// I/O error while reading a table file
    IoError,
}

impl fmt::Display for PartitionTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMagic { offset } => {
                write!(f, "invalid partition entry magic at offset 0x{:X}", offset)
            }
            Self::Truncated => write!(f, "partition table is truncated"),
            Self::TooManyEntries => write!(f, "too many partition entries"),
            Self::OverlappingPartitions => write!(f, "overlapping partitions"),
            Self::ParseError => write!(f, "failed to parse partition table"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PartitionTableError {}

fn parse_entry(entry: &[u8]) -> Partition {
    let kind = PartitionKind::from_raw(entry[2], entry[3]);
    let address = u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]);
    let size = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]);
    let label_bytes = &entry[12..12 + LABEL_LEN];
    let flags = u32::from_le_bytes([entry[28], entry[29], entry[30], entry[31]]);

    let end = label_bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(label_bytes.len());
    let label = core::str::from_utf8(&label_bytes[..end]).unwrap_or("");

    Partition {
        label: truncate_label(label),
        kind,
        address,
        size,
        flags: PartitionFlags::from_bits_truncate(flags),
    }
}

impl PartitionTable {
    /// Parse a binary partition table
    ///
    /// `data` is the raw table, starting at its first entry. Parsing stops at
    /// the first erased row or after `MAX_TABLE_LEN` bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PartitionTableError> {
        let mut table = PartitionTable::new();
        let limit = core::cmp::min(data.len(), MAX_TABLE_LEN);
        let mut offset = 0;

        while offset < limit {
            if offset + ENTRY_SIZE > data.len() {
                return Err(PartitionTableError::Truncated);
            }
            let entry = &data[offset..offset + ENTRY_SIZE];
            let magic = [entry[0], entry[1]];

            if magic == END_MAGIC {
                break;
            } else if magic == MD5_MAGIC {
                log::trace!("Skipping MD5 row at offset 0x{:X}", offset);
            } else if magic == ENTRY_MAGIC {
                let partition = parse_entry(entry);
                log::trace!("Parsed partition {}", partition);
                table
                    .push(partition)
                    .map_err(|_| PartitionTableError::TooManyEntries)?;
            } else {
                return Err(PartitionTableError::InvalidMagic { offset });
            }

            offset += ENTRY_SIZE;
        }

        table.validate()?;
        Ok(table)
    }

    /// Check that no two partitions share any byte
    pub fn validate(&self) -> Result<(), PartitionTableError> {
        for (i, a) in self.iter().enumerate() {
            for b in self.iter().skip(i + 1) {
                // Adjacent partitions are normal here, so use the half-open test
                let a_end = a.address as u64 + a.size as u64;
                let b_end = b.address as u64 + b.size as u64;
                if (a.address as u64) < b_end && (b.address as u64) < a_end {
                    return Err(PartitionTableError::OverlappingPartitions);
                }
            }
        }
        Ok(())
    }

    /// Serialize into `buf`, returning the number of bytes used
    ///
    /// The table is terminated with an erased row when there is room for it.
    ///
    /// # Errors
    /// * `Truncated` - `buf` cannot hold every entry
    pub fn write_bytes(&self, buf: &mut [u8]) -> Result<usize, PartitionTableError> {
        let needed = self.len() * ENTRY_SIZE;
        if buf.len() < needed {
            return Err(PartitionTableError::Truncated);
        }

        for (i, p) in self.iter().enumerate() {
            let entry = &mut buf[i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE];
            entry.fill(0);
            entry[0..2].copy_from_slice(&ENTRY_MAGIC);
            entry[2] = p.kind.raw_type();
            entry[3] = p.kind.raw_subtype();
            entry[4..8].copy_from_slice(&p.address.to_le_bytes());
            entry[8..12].copy_from_slice(&p.size.to_le_bytes());
            let label = p.label.as_bytes();
            entry[12..12 + label.len()].copy_from_slice(label);
            entry[28..32].copy_from_slice(&p.flags.bits().to_le_bytes());
        }

        let mut used = needed;
        if buf.len() >= needed + ENTRY_SIZE {
            buf[needed..needed + ENTRY_SIZE].fill(0xFF);
            used += ENTRY_SIZE;
        }
        Ok(used)
    }
}
