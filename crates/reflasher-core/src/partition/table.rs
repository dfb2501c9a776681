//! Fixed-capacity partition table

use heapless::Vec;

use super::types::{AppSubtype, Partition, PartitionKind, PartitionType, OTA_SLOT_COUNT};
use crate::error::{Error, Result};

/// Maximum number of entries a partition table can hold
pub const MAX_PARTITIONS: usize = 95;

/// A read-only view of the device's partitions
///
/// The engine never adds or removes entries once a session is running; the
/// table is built once by the caller (or parsed from flash) and then only
/// searched.
#[derive(Debug, Clone, Default)]
pub struct PartitionTable {
    entries: Vec<Partition, MAX_PARTITIONS>,
}

impl PartitionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append a partition
    ///
    /// # Errors
    /// * `AllocationFailure` - If the table already holds `MAX_PARTITIONS` entries
    pub fn push(&mut self, partition: Partition) -> Result<()> {
        self.entries
            .push(partition)
            .map_err(|_| Error::AllocationFailure)
    }

    /// All partitions in table order
    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find partitions of a type, optionally restricted to a raw subtype
    pub fn find(
        &self,
        kind: PartitionType,
        subtype: Option<u8>,
    ) -> impl Iterator<Item = &Partition> {
        self.entries.iter().filter(move |p| {
            kind.matches(&p.kind) && subtype.is_none_or(|s| p.kind.raw_subtype() == s)
        })
    }

    /// First partition of a type, optionally restricted to a raw subtype
    pub fn find_first(&self, kind: PartitionType, subtype: Option<u8>) -> Option<&Partition> {
        self.find(kind, subtype).next()
    }

    /// Find a partition by label (case-sensitive, labels are identifiers)
    pub fn find_by_label(&self, label: &str) -> Option<&Partition> {
        self.entries.iter().find(|p| p.label.as_str() == label)
    }

    /// The partition whose range contains `address`
    pub fn containing(&self, address: u32) -> Option<&Partition> {
        self.entries.iter().find(|p| p.region().contains(address))
    }

    /// OTA slot `n`, if present
    pub fn ota_slot(&self, slot: u8) -> Option<&Partition> {
        self.entries
            .iter()
            .find(|p| p.kind == PartitionKind::App(AppSubtype::Ota(slot)))
    }

    /// OTA slots in ascending slot order, independent of table order
    pub fn ota_slots(&self) -> impl Iterator<Item = &Partition> {
        (0..OTA_SLOT_COUNT).filter_map(move |slot| self.ota_slot(slot))
    }

    /// Number of OTA slots in the table
    pub fn ota_slot_count(&self) -> usize {
        self.ota_slots().count()
    }

    /// The application partition the running program was loaded from
    ///
    /// `program_address` is the physical flash address of any code in the
    /// running image.
    ///
    /// # Panics
    /// If no application partition contains `program_address`. A table that
    /// does not describe the running image is corrupt and nothing written
    /// based on it could be trusted.
    pub fn running_partition(&self, program_address: u32) -> &Partition {
        match self
            .find(PartitionType::App, None)
            .find(|p| p.region().contains(program_address))
        {
            Some(partition) => partition,
            None => panic!(
                "partition table is invalid or corrupt: no app partition contains 0x{:08X}",
                program_address
            ),
        }
    }
}

impl<'a> IntoIterator for &'a PartitionTable {
    type Item = &'a Partition;
    type IntoIter = core::slice::Iter<'a, Partition>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
