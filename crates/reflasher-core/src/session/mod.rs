//! Reflash sessions
//!
//! A [`ReflashSession`] ties a storage partition, a destination region and a
//! transport configuration together. The usual sequence is:
//!
//! 1. [`ReflashSession::init`] selects a storage partition that does not
//!    overlap the destination and erases it
//! 2. [`ReflashSession::download`] streams the image into the partition
//! 3. [`ReflashSession::copy_to_region`] moves it to the destination
//! 4. optionally [`ReflashSession::reconfigure`] for another image, then
//!    back to 2
//! 5. [`ReflashSession::finish`]
//!
//! # Example
//!
//! ```ignore
//! let config = SessionConfig::new(Region::new(0x1000, 0x8000), url);
//! let mut session = ReflashSession::init(&mut flash, &mut http, &table, pc, config)?;
//! session.download()?;
//! session.copy_to_region()?;
//! let summary = session.finish();
//! ```

mod config;
pub(crate) mod copy;
mod download;

pub use config::{DirectCopyConfig, SessionConfig};

use core::fmt;

use crate::error::{Error, Result};
use crate::flash::{access, FlashDevice};
use crate::partition::{Partition, PartitionSelector, PartitionTable};
use crate::region::Region;
use crate::transport::Transport;
use maybe_async::maybe_async;

/// Size of the bounce buffer used for downloads and copies
pub const CHUNK_SIZE: usize = 1024;

/// Where a session is in its download/copy cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// A storage partition is selected and erased, nothing staged
    Ready,
    /// An image is staged in the storage partition
    Downloaded,
    /// The staged image has been copied to the destination
    Copied,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Downloaded => "downloaded",
            Self::Copied => "copied",
        };
        f.write_str(name)
    }
}

/// What a finished session did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Storage partition in use when the session finished
    pub target: Partition,
    /// Destination of the last transfer
    pub destination: Region,
    /// State the session was in when it finished
    pub state: SessionState,
    /// Number of successful downloads
    pub downloads: u32,
    /// Number of successful copies
    pub copies: u32,
    /// Total bytes downloaded by successful downloads
    pub bytes_downloaded: u64,
    /// Total bytes copied to destinations
    pub bytes_copied: u64,
}

/// A self-reflash session over a flash device and a transport
///
/// The session borrows both collaborators exclusively for its lifetime.
pub struct ReflashSession<'a, F, T>
where
    F: FlashDevice + ?Sized,
    T: Transport + ?Sized,
{
    flash: &'a mut F,
    transport: &'a mut T,
    selector: PartitionSelector<'a>,
    target: Partition,
    destination: Region,
    transport_config: T::Config,
    download_cursor: u32,
    copy_cursor: u32,
    pending_transfer_size: u32,
    state: SessionState,
    downloads: u32,
    copies: u32,
    bytes_downloaded: u64,
    bytes_copied: u64,
}

impl<'a, F, T> ReflashSession<'a, F, T>
where
    F: FlashDevice + ?Sized,
    T: Transport + ?Sized,
{
    /// Create a session and prepare its storage partition
    ///
    /// `running_address` is a physical flash address inside the running
    /// program; its partition is where the slot rotation starts. It is only
    /// looked up when `config` names no target.
    ///
    /// # Errors
    /// * `InvalidArgument` - The destination is empty
    /// * `NoSuitablePartition` - No storage partition avoids the destination
    /// * `FlashEraseFailure` - Erasing the selected partition failed
    ///
    /// # Panics
    /// If `config` names no target and no application partition contains
    /// `running_address`.
    #[maybe_async]
    pub async fn init(
        flash: &'a mut F,
        transport: &'a mut T,
        table: &'a PartitionTable,
        running_address: u32,
        config: SessionConfig<T::Config>,
    ) -> Result<Self> {
        let SessionConfig {
            destination,
            transport: transport_config,
            target,
        } = config;

        if destination.is_empty() {
            log::error!("Destination region {} is empty", destination);
            return Err(Error::InvalidArgument);
        }

        let selector = PartitionSelector::new(table, running_address);
        let target = match target {
            Some(explicit) => checked_explicit_target(explicit, &destination)?,
            None => selector.select(&destination, None)?,
        };

        log::info!(
            "Staging in partition {} for destination {}",
            target,
            destination
        );
        access::erase_partition(flash, &target, 0, target.size).await?;
        log::info!("Partition erased successfully");

        Ok(Self {
            flash,
            transport,
            selector,
            target,
            destination,
            transport_config,
            download_cursor: 0,
            copy_cursor: 0,
            pending_transfer_size: 0,
            state: SessionState::Ready,
            downloads: 0,
            copies: 0,
            bytes_downloaded: 0,
            bytes_copied: 0,
        })
    }

    /// Prepare the session for another transfer
    ///
    /// The current storage partition is kept, and the next download appended
    /// after the previous one, as long as it does not overlap the new
    /// destination. Otherwise the selector picks the slot after the current
    /// one, and the new partition is erased with both cursors reset. An
    /// explicit target in `config` is used as is when it avoids the
    /// destination.
    ///
    /// The session is consumed on every failure, a rejected state included.
    /// Callers that want to keep a session with an uncopied image check
    /// [`Self::state`] first.
    ///
    /// # Errors
    /// * `InvalidState` - A staged image has not been copied yet
    /// * `InvalidArgument` - The destination is empty
    /// * `NoSuitablePartition` - No storage partition avoids the destination
    /// * `FlashEraseFailure` - Erasing the new partition failed
    #[maybe_async]
    pub async fn reconfigure(mut self, config: SessionConfig<T::Config>) -> Result<Self> {
        self.check_state(&[SessionState::Ready, SessionState::Copied])?;

        let SessionConfig {
            destination,
            transport: transport_config,
            target,
        } = config;

        log::info!("Updating configuration for next download");
        if destination.is_empty() {
            log::error!("Destination region {} is empty", destination);
            return Err(Error::InvalidArgument);
        }

        let target = match target {
            Some(explicit) => checked_explicit_target(explicit, &destination)?,
            None if !self.target.overlaps(&destination) => self.target.clone(),
            None => {
                log::info!(
                    "Partition {} overlaps destination {}, selecting another",
                    self.target,
                    destination
                );
                self.selector.select(&destination, Some(&self.target))?
            }
        };

        if target != self.target {
            log::info!("New partition target set: {}", target);
            access::erase_partition(self.flash, &target, 0, target.size).await?;
            log::info!("Partition erased successfully");
            self.target = target;
            self.download_cursor = 0;
            self.copy_cursor = 0;
        }

        self.destination = destination;
        self.transport_config = transport_config;
        self.pending_transfer_size = 0;
        self.state = SessionState::Ready;
        Ok(self)
    }

    /// End the session and release the flash device and transport
    pub fn finish(self) -> SessionSummary {
        log::info!(
            "Session finished: {} downloads, {} copies",
            self.downloads,
            self.copies
        );
        SessionSummary {
            target: self.target,
            destination: self.destination,
            state: self.state,
            downloads: self.downloads,
            copies: self.copies,
            bytes_downloaded: self.bytes_downloaded,
            bytes_copied: self.bytes_copied,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Storage partition images are staged in
    pub fn target(&self) -> &Partition {
        &self.target
    }

    /// Destination of the current transfer
    pub fn destination(&self) -> Region {
        self.destination
    }

    /// Transport configuration for the next download
    pub fn transport_config(&self) -> &T::Config {
        &self.transport_config
    }

    /// Offset in the storage partition where the next download starts
    pub fn download_cursor(&self) -> u32 {
        self.download_cursor
    }

    /// Offset in the storage partition of the staged image
    pub fn copy_cursor(&self) -> u32 {
        self.copy_cursor
    }

    /// Size of the staged image, 0 if nothing is staged
    pub fn pending_transfer_size(&self) -> u32 {
        self.pending_transfer_size
    }

    fn check_state(&self, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            log::error!("Operation not allowed in state {}", self.state);
            Err(Error::InvalidState(self.state))
        }
    }
}

fn checked_explicit_target(target: Partition, destination: &Region) -> Result<Partition> {
    if target.overlaps(destination) {
        log::error!(
            "Requested partition {} overlaps destination {}",
            target,
            destination
        );
        return Err(Error::NoSuitablePartition);
    }
    Ok(target)
}
