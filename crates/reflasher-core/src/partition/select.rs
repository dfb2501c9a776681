//! Storage partition selection
//!
//! Finds an OTA slot that can safely hold an update image without touching
//! the region the image will finally be copied to.

use super::table::PartitionTable;
use super::types::Partition;
use crate::error::{Error, Result};
use crate::region::Region;

/// Picks staging partitions from a partition table
///
/// The running program's own partition is the default starting point of the
/// slot rotation. It is only looked up when a search actually starts there,
/// so a selector can be built for code that does not run from the table
/// (e.g. from RAM) as long as every search names its own starting point.
#[derive(Debug, Clone)]
pub struct PartitionSelector<'t> {
    table: &'t PartitionTable,
    program_address: u32,
}

impl<'t> PartitionSelector<'t> {
    /// Create a selector for `table`
    ///
    /// `program_address` is the physical flash address of code in the running
    /// image.
    pub fn new(table: &'t PartitionTable, program_address: u32) -> Self {
        Self {
            table,
            program_address,
        }
    }

    /// The partition table being searched
    pub fn table(&self) -> &'t PartitionTable {
        self.table
    }

    /// The partition the running program was loaded from
    ///
    /// # Panics
    /// If no application partition contains the program address (see
    /// [`PartitionTable::running_partition`]).
    pub fn running(&self) -> &'t Partition {
        let running = self.table.running_partition(self.program_address);
        log::debug!("Running from partition {}", running);
        running
    }

    /// The OTA slot following `start_from` in slot order
    ///
    /// Wraps around to the first slot after the last one. If `start_from` is
    /// not an OTA slot (e.g. a factory image), the first slot is returned.
    /// `None` means "start from the running partition".
    ///
    /// # Panics
    /// If `start_from` is `None` and the running partition cannot be found.
    pub fn next_slot(&self, start_from: Option<&Partition>) -> Option<&'t Partition> {
        let start_from = match start_from {
            Some(partition) => partition,
            None => self.running(),
        };
        let mut first = None;
        let mut next_is_result = false;

        for slot in self.table.ota_slots() {
            if first.is_none() {
                first = Some(slot);
            }
            if slot == start_from {
                next_is_result = true;
            } else if next_is_result {
                return Some(slot);
            }
        }

        first
    }

    /// Select a storage partition that does not overlap `protect`
    ///
    /// Starting after `after` (or after the running partition when `None`),
    /// each OTA slot is tried once in rotation order and the first one that
    /// does not overlap `protect` is returned.
    ///
    /// # Errors
    /// * `NoSuitablePartition` - Every OTA slot overlaps `protect`
    pub fn select(&self, protect: &Region, after: Option<&Partition>) -> Result<Partition> {
        let mut cursor = after;

        for _ in 0..self.table.ota_slot_count() {
            let Some(candidate) = self.next_slot(cursor) else {
                break;
            };
            log::debug!(
                "Candidate {} against destination {}",
                candidate,
                protect
            );
            if !candidate.overlaps(protect) {
                return Ok(candidate.clone());
            }
            cursor = Some(candidate);
        }

        log::error!("Every storage partition overlaps destination {}", protect);
        Err(Error::NoSuitablePartition)
    }
}
