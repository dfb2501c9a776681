//! Raw flash device trait
//!
//! This module provides the `FlashDevice` trait: address-based read, write
//! and erase over the device's flat physical address space. The final
//! destination of an update may lie outside the partition table, so the
//! engine always talks to the device in physical addresses; partition
//! relative access is layered on top in [`super::access`].
//!
//! Uses `maybe_async` to support both sync and async modes.

use crate::error::Result;
use maybe_async::maybe_async;

/// The erased value for flash memory (all bits set)
pub const ERASED_VALUE: u8 = 0xFF;

/// Unified trait for flash devices
///
/// All operations use 32-bit physical addresses.
///
/// # Example
///
/// ```ignore
/// use reflasher_core::flash::FlashDevice;
///
/// fn read_header<D: FlashDevice>(device: &mut D, addr: u32) -> Result<[u8; 4]> {
///     let mut buf = [0u8; 4];
///     device.read(addr, &mut buf)?;
///     Ok(buf)
/// }
/// ```
#[maybe_async(AFIT)]
pub trait FlashDevice {
    /// Get the total flash size in bytes
    fn size(&self) -> u32;

    /// Get the minimum erase block size in bytes
    ///
    /// All erase operations must be aligned to this size and be a multiple
    /// of it.
    fn erase_granularity(&self) -> u32;

    /// Read flash contents into the provided buffer
    ///
    /// # Errors
    /// * `AddressOutOfBounds` - If the read extends beyond flash size
    async fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Write data to flash
    ///
    /// The target range must have been erased first; writing can only clear
    /// bits.
    ///
    /// # Errors
    /// * `AddressOutOfBounds` - If the write extends beyond flash size
    async fn write(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Erase a region of flash
    ///
    /// # Errors
    /// * `AddressOutOfBounds` - If the erase extends beyond flash size
    /// * `InvalidAlignment` - If address or length is not properly aligned
    async fn erase(&mut self, addr: u32, len: u32) -> Result<()>;

    /// Check if a range is valid for this device
    fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        // Use u64 arithmetic to avoid truncation when len > u32::MAX
        let end = addr as u64 + len as u64;
        end <= self.size() as u64
    }
}
