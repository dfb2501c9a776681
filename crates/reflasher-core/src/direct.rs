//! Copying an image that is already resident in flash
//!
//! Used when the replacement image ships inside the running program, so no
//! download or staging partition is needed.

use crate::error::{Error, Result};
use crate::flash::FlashDevice;
use crate::progress::{NoProgress, ReflashProgress};
use crate::region::Region;
use crate::session::copy::copy_chunks;
use crate::session::DirectCopyConfig;
use maybe_async::maybe_async;

/// Copy `config.size` bytes from the source region to the destination
///
/// See [`direct_copy_with_progress`].
#[maybe_async]
pub async fn direct_copy<F: FlashDevice + ?Sized>(
    flash: &mut F,
    config: DirectCopyConfig,
) -> Result<()> {
    direct_copy_with_progress(flash, config, &mut NoProgress).await
}

/// Copy `config.size` bytes from the source region to the destination
///
/// The whole destination is erased, even when `size` is 0.
///
/// # Errors
/// * `SizeOverflow` - `size` exceeds the source or the destination
/// * `InvalidArgument` - The destination is empty, or source and
///   destination overlap
/// * `FlashEraseFailure`, `FlashReadFailure`, `FlashWriteFailure` - Flash
///   access failed
#[maybe_async]
pub async fn direct_copy_with_progress<F, P>(
    flash: &mut F,
    config: DirectCopyConfig,
    progress: &mut P,
) -> Result<()>
where
    F: FlashDevice + ?Sized,
    P: ReflashProgress + ?Sized,
{
    let DirectCopyConfig {
        source,
        destination,
        size,
    } = config;

    for capacity in [source.size, destination.size] {
        if size > capacity {
            log::error!("Copy of {} bytes does not fit {} bytes", size, capacity);
            return Err(Error::SizeOverflow {
                required: size,
                capacity,
            });
        }
    }
    if destination.is_empty() {
        log::error!("Destination region {} is empty", destination);
        return Err(Error::InvalidArgument);
    }
    if size > 0 && source.overlaps(&destination) {
        log::error!(
            "Source {} overlaps destination {}",
            source,
            destination
        );
        return Err(Error::InvalidArgument);
    }

    log::info!(
        "Starting copy 0x{:08X} bytes from address 0x{:08X} to address 0x{:08X}",
        size,
        source.address,
        destination.address
    );
    let copied = copy_chunks(
        flash,
        Region::new(source.address, size),
        destination,
        progress,
    )
    .await?;
    log::info!(
        "Data copied from address 0x{:08X} to region: 0x{:08X}",
        source.address,
        destination.address
    );
    progress.complete(copied);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFlash;

    #[test]
    fn test_direct_copy_moves_bytes() {
        let mut flash = MockFlash::new(0x10000);
        for (i, b) in flash.data[0x8000..0x8800].iter_mut().enumerate() {
            *b = i as u8;
        }
        let config =
            DirectCopyConfig::new(Region::new(0x8000, 0x800), Region::new(0x1000, 0x1000));
        direct_copy(&mut flash, config).unwrap();

        let (src, dst) = (0x8000..0x8800, 0x1000..0x1800);
        assert_eq!(&flash.data[dst], &flash.data[src]);
        assert!(flash.data[0x1800..0x2000].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_direct_copy_zero_size_erases() {
        let mut flash = MockFlash::new(0x10000);
        flash.fill(0x1000, 0x1000, 0x00);
        let config =
            DirectCopyConfig::new(Region::new(0x1800, 0x800), Region::new(0x1000, 0x1000))
                .with_size(0);
        direct_copy(&mut flash, config).unwrap();

        assert_eq!(flash.erase_log, std::vec![(0x1000, 0x1000)]);
        assert!(flash.writes.is_empty());
        assert!(flash.data[0x1000..0x2000].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_direct_copy_validation() {
        let mut flash = MockFlash::new(0x10000);
        let src = Region::new(0x8000, 0x800);

        let too_big = DirectCopyConfig::new(src, Region::new(0x1000, 0x400));
        assert_eq!(
            direct_copy(&mut flash, too_big),
            Err(Error::SizeOverflow {
                required: 0x800,
                capacity: 0x400
            })
        );

        let past_source = DirectCopyConfig::new(src, Region::new(0x1000, 0x1000)).with_size(0x900);
        assert_eq!(
            direct_copy(&mut flash, past_source),
            Err(Error::SizeOverflow {
                required: 0x900,
                capacity: 0x800
            })
        );

        let empty = DirectCopyConfig::new(src, Region::new(0x1000, 0)).with_size(0);
        assert_eq!(direct_copy(&mut flash, empty), Err(Error::InvalidArgument));

        let overlapping = DirectCopyConfig::new(src, Region::new(0x8400, 0x1000));
        assert_eq!(
            direct_copy(&mut flash, overlapping),
            Err(Error::InvalidArgument)
        );

        assert_eq!(flash.erases, 0);
    }
}
