//! Checked flash access
//!
//! Thin wrappers around [`FlashDevice`] used by the engine. Partition
//! accessors take offsets relative to the partition start, refuse to leave
//! the partition and refuse to touch read-only partitions. Region accessors
//! take physical addresses. Every failure is logged here and reported with
//! the physical address involved, so callers only need `?`.

use crate::error::{Error, Result};
use crate::flash::device::FlashDevice;
use crate::partition::Partition;
use crate::region::Region;
use maybe_async::maybe_async;

/// Physical address of `offset..offset+len` within `partition`, if it fits
fn partition_range(partition: &Partition, offset: u32, len: usize) -> Option<u32> {
    let end = offset as u64 + len as u64;
    if end > partition.size as u64 {
        return None;
    }
    partition.address.checked_add(offset)
}

/// Read from a partition at a partition-relative offset
#[maybe_async]
pub async fn read_partition<F: FlashDevice + ?Sized>(
    flash: &mut F,
    partition: &Partition,
    offset: u32,
    buf: &mut [u8],
) -> Result<()> {
    let addr = partition.address.wrapping_add(offset);
    let Some(addr) = partition_range(partition, offset, buf.len()) else {
        log::error!(
            "Read of {} bytes at offset 0x{:X} leaves partition {}",
            buf.len(),
            offset,
            partition
        );
        return Err(Error::FlashReadFailure { addr });
    };

    read_region(flash, addr, buf).await
}

/// Write to a partition at a partition-relative offset
#[maybe_async]
pub async fn write_partition<F: FlashDevice + ?Sized>(
    flash: &mut F,
    partition: &Partition,
    offset: u32,
    data: &[u8],
) -> Result<()> {
    let addr = partition.address.wrapping_add(offset);
    if partition.is_readonly() {
        log::error!("Refusing to write read-only partition {}", partition);
        return Err(Error::FlashWriteFailure { addr });
    }
    let Some(addr) = partition_range(partition, offset, data.len()) else {
        log::error!(
            "Write of {} bytes at offset 0x{:X} leaves partition {}",
            data.len(),
            offset,
            partition
        );
        return Err(Error::FlashWriteFailure { addr });
    };

    write_region(flash, addr, data).await
}

/// Erase `len` bytes of a partition starting at a partition-relative offset
#[maybe_async]
pub async fn erase_partition<F: FlashDevice + ?Sized>(
    flash: &mut F,
    partition: &Partition,
    offset: u32,
    len: u32,
) -> Result<()> {
    let addr = partition.address.wrapping_add(offset);
    if partition.is_readonly() {
        log::error!("Refusing to erase read-only partition {}", partition);
        return Err(Error::FlashEraseFailure { addr, len });
    }
    if partition_range(partition, offset, len as usize).is_none() {
        log::error!(
            "Erase of 0x{:X} bytes at offset 0x{:X} leaves partition {}",
            len,
            offset,
            partition
        );
        return Err(Error::FlashEraseFailure { addr, len });
    }

    erase_region(flash, &Region::new(addr, len)).await
}

/// Read from a physical address
#[maybe_async]
pub async fn read_region<F: FlashDevice + ?Sized>(
    flash: &mut F,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    flash.read(addr, buf).await.map_err(|e| {
        log::error!("Failed to read from flash, address: 0x{:08X}, error: {}", addr, e);
        Error::FlashReadFailure { addr }
    })
}

/// Write to a physical address
#[maybe_async]
pub async fn write_region<F: FlashDevice + ?Sized>(
    flash: &mut F,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    flash.write(addr, data).await.map_err(|e| {
        log::error!("Failed to write to flash, address: 0x{:08X}, error: {}", addr, e);
        Error::FlashWriteFailure { addr }
    })
}

/// Erase a whole physical region
///
/// The region must be aligned to the device's erase granularity; a
/// misaligned region is refused before the device is touched.
#[maybe_async]
pub async fn erase_region<F: FlashDevice + ?Sized>(flash: &mut F, region: &Region) -> Result<()> {
    let granularity = flash.erase_granularity();
    if !region.is_aligned(granularity) {
        log::error!(
            "Flash region {} is not aligned to the {} byte erase block",
            region,
            granularity
        );
        return Err(Error::FlashEraseFailure {
            addr: region.address,
            len: region.size,
        });
    }

    flash.erase(region.address, region.size).await.map_err(|e| {
        log::error!("Failed to erase flash region {}, error: {}", region, e);
        Error::FlashEraseFailure {
            addr: region.address,
            len: region.size,
        }
    })
}
