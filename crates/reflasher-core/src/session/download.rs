//! Streaming an image from the transport into the storage partition

use super::{ReflashSession, SessionState, CHUNK_SIZE};
use crate::error::{Error, ReadFailure, Result};
use crate::flash::{access, FlashDevice};
use crate::progress::{NoProgress, ReflashProgress};
use crate::transport::{is_connection_closed, Connection, Transport, STATUS_OK};
use maybe_async::maybe_async;

impl<F, T> ReflashSession<'_, F, T>
where
    F: FlashDevice + ?Sized,
    T: Transport + ?Sized,
{
    /// Download the configured image into the storage partition
    ///
    /// See [`Self::download_with_progress`].
    #[maybe_async]
    pub async fn download(&mut self) -> Result<u32> {
        self.download_with_progress(&mut NoProgress).await
    }

    /// Download the configured image into the storage partition
    ///
    /// The image is appended at the download cursor, one chunk at a time.
    /// Returns the number of bytes written. The transport connection is
    /// closed on every exit path.
    ///
    /// If the download fails after some bytes were written, the cursor moves
    /// past them so the next attempt starts on erased flash.
    ///
    /// # Errors
    /// * `InvalidState` - The session is not `Ready`
    /// * `TransportOpenFailure` - The connection or request failed
    /// * `TransportProtocolFailure` - The response status was not 200
    /// * `TransportReadFailure` - The body could not be read completely
    /// * `SizeOverflow` - The image does not fit in the partition
    /// * `FlashWriteFailure` - Writing a chunk failed
    #[maybe_async]
    pub async fn download_with_progress<P: ReflashProgress + ?Sized>(
        &mut self,
        progress: &mut P,
    ) -> Result<u32> {
        self.check_state(&[SessionState::Ready])?;

        let mut written = 0u32;
        let result = self.stream_into_target(&mut written, progress).await;

        if let Err(e) = result {
            if written > 0 {
                log::warn!(
                    "Skipping {} bytes at offset 0x{:X} of {} after failed download",
                    written,
                    self.download_cursor,
                    self.target
                );
                self.download_cursor += written;
            }
            return Err(e);
        }

        log::info!(
            "Total downloaded binary length: {} (0x{:X})",
            written,
            written
        );
        self.copy_cursor = self.download_cursor;
        self.download_cursor += written;
        self.pending_transfer_size = written;
        self.state = SessionState::Downloaded;
        self.downloads += 1;
        self.bytes_downloaded += written as u64;
        progress.complete(written);

        Ok(written)
    }

    /// Run one transfer, counting bytes handed to the flash in `written`
    #[maybe_async]
    async fn stream_into_target<P: ReflashProgress + ?Sized>(
        &mut self,
        written: &mut u32,
        progress: &mut P,
    ) -> Result<()> {
        let mut conn = Connection::new(&mut *self.transport);

        conn.open(&self.transport_config).await.map_err(|e| {
            log::error!("Failed to open connection: {:?}", e);
            Error::TransportOpenFailure
        })?;

        let status = conn.fetch_headers().await.map_err(|e| {
            log::error!("Failed to fetch response headers: {:?}", e);
            Error::TransportOpenFailure
        })?;
        if status != STATUS_OK {
            log::error!("Request failed with status {}", status);
            return Err(Error::TransportProtocolFailure { status });
        }

        progress.downloading(conn.content_length());

        let capacity = self.target.size;
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let len = match conn.read(&mut buf).await {
                Ok(len) => len.min(CHUNK_SIZE),
                Err(e) if is_connection_closed(&e) => {
                    log::error!("Connection closed after {} bytes: {:?}", written, e);
                    return Err(Error::TransportReadFailure(ReadFailure::ConnectionClosed {
                        received: *written,
                    }));
                }
                Err(e) => {
                    log::error!("Stream read failed after {} bytes: {:?}", written, e);
                    return Err(Error::TransportReadFailure(ReadFailure::Stream {
                        received: *written,
                    }));
                }
            };

            if len == 0 {
                if !conn.is_connected() {
                    log::error!("Connection closed by peer");
                    break;
                }
                if conn.is_complete() {
                    log::info!("All data received");
                    break;
                }
                continue;
            }

            let required = self.download_cursor as u64 + *written as u64 + len as u64;
            if required > capacity as u64 {
                log::error!(
                    "Image exceeds partition {}: needs {} bytes",
                    self.target,
                    required
                );
                return Err(Error::SizeOverflow {
                    required: u32::try_from(required).unwrap_or(u32::MAX),
                    capacity,
                });
            }

            let offset = self.download_cursor + *written;
            *written += len as u32;
            access::write_partition(&mut *self.flash, &self.target, offset, &buf[..len]).await?;

            log::debug!(
                "Chunk length written: {} partial downloaded length {}",
                len,
                written
            );
            progress.download_progress(*written);
        }

        if !conn.is_complete() {
            log::error!("Error in receiving complete data");
            return Err(Error::TransportReadFailure(ReadFailure::Incomplete {
                received: *written,
            }));
        }

        Ok(())
    }
}
