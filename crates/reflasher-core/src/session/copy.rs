//! Moving a staged image to its destination region

use super::{ReflashSession, SessionState, CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::flash::{access, FlashDevice};
use crate::progress::{NoProgress, ReflashProgress};
use crate::region::Region;
use crate::transport::Transport;
use maybe_async::maybe_async;

impl<F, T> ReflashSession<'_, F, T>
where
    F: FlashDevice + ?Sized,
    T: Transport + ?Sized,
{
    /// Copy the staged image to the destination region
    ///
    /// See [`Self::copy_to_region_with_progress`].
    #[maybe_async]
    pub async fn copy_to_region(&mut self) -> Result<()> {
        self.copy_to_region_with_progress(&mut NoProgress).await
    }

    /// Copy the staged image to the destination region
    ///
    /// The whole destination is erased first, then the image is copied in
    /// chunks. Copying again after a successful copy repeats the erase and
    /// the copy.
    ///
    /// # Errors
    /// * `InvalidState` - Nothing has been downloaded, or the download was
    ///   empty
    /// * `SizeOverflow` - The image is larger than the destination
    /// * `FlashEraseFailure` - Erasing the destination failed
    /// * `FlashReadFailure` - Reading the storage partition failed
    /// * `FlashWriteFailure` - Writing the destination failed
    #[maybe_async]
    pub async fn copy_to_region_with_progress<P: ReflashProgress + ?Sized>(
        &mut self,
        progress: &mut P,
    ) -> Result<()> {
        self.check_state(&[SessionState::Downloaded, SessionState::Copied])?;

        let size = self.pending_transfer_size;
        if size == 0 {
            log::error!("No data staged, refusing to erase {}", self.destination);
            return Err(Error::InvalidState(self.state));
        }
        let destination = self.destination;
        if size > destination.size {
            log::error!(
                "Staged image of {} bytes does not fit destination {}",
                size,
                destination
            );
            return Err(Error::SizeOverflow {
                required: size,
                capacity: destination.size,
            });
        }

        let source = self.target.address + self.copy_cursor;
        log::info!(
            "Starting copy 0x{:08X} bytes from address 0x{:08X} to address 0x{:08X}",
            size,
            source,
            destination.address
        );

        let copied = copy_chunks(
            &mut *self.flash,
            Region::new(source, size),
            destination,
            progress,
        )
        .await?;
        if copied != size {
            log::error!("Copied {} of {} bytes", copied, size);
            return Err(Error::SizeOverflow {
                required: size,
                capacity: copied,
            });
        }

        log::info!(
            "Data copied from partition address 0x{:08X} offset 0x{:08X} to region: 0x{:08X}",
            self.target.address,
            self.copy_cursor,
            destination.address
        );
        self.state = SessionState::Copied;
        self.copies += 1;
        self.bytes_copied += copied as u64;
        progress.complete(copied);

        Ok(())
    }
}

/// Erase `destination`, then copy `source` into its start
///
/// Returns the number of bytes copied. The caller guarantees `source` fits
/// in `destination`.
#[maybe_async]
pub(crate) async fn copy_chunks<F, P>(
    flash: &mut F,
    source: Region,
    destination: Region,
    progress: &mut P,
) -> Result<u32>
where
    F: FlashDevice + ?Sized,
    P: ReflashProgress + ?Sized,
{
    progress.erasing(destination.size);
    access::erase_region(flash, &destination).await?;
    log::info!("Flash destination region erased successfully");

    progress.copying(source.size);
    let mut buf = [0u8; CHUNK_SIZE];
    let mut copied = 0u32;
    while copied < source.size {
        let len = (source.size - copied).min(CHUNK_SIZE as u32);
        let chunk = &mut buf[..len as usize];
        let read_addr = source.address + copied;
        let write_addr = destination.address + copied;

        log::debug!(
            "Reading 0x{:08X} bytes from address 0x{:08X}",
            len,
            read_addr
        );
        access::read_region(flash, read_addr, chunk).await?;
        access::write_region(flash, write_addr, chunk).await?;
        log::debug!("Data written to address 0x{:08X} successfully", write_addr);

        copied += len;
        progress.copy_progress(copied);
    }

    if log::log_enabled!(log::Level::Debug) && !destination.is_empty() {
        let mut word = [0u8; 4];
        let len = destination.size.min(4) as usize;
        access::read_region(flash, destination.address, &mut word[..len]).await?;
        log::debug!("Data read from flash: 0x{:08X}", u32::from_le_bytes(word));
    }

    Ok(copied)
}
