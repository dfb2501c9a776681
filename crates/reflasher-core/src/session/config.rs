//! Session and direct-copy configuration

use crate::partition::Partition;
use crate::region::Region;

/// Configuration for one transfer of a [`super::ReflashSession`]
///
/// Used both to create a session and to reconfigure it for the next
/// transfer.
#[derive(Debug, Clone)]
pub struct SessionConfig<C> {
    /// Final physical region the downloaded image is copied to
    pub destination: Region,
    /// Transport configuration for the download (URL, ...)
    pub transport: C,
    /// Storage partition to stage into, instead of letting the selector pick
    pub target: Option<Partition>,
}

impl<C> SessionConfig<C> {
    /// Configuration that lets the selector pick the storage partition
    pub fn new(destination: Region, transport: C) -> Self {
        Self {
            destination,
            transport,
            target: None,
        }
    }

    /// Stage into `target` instead of a selected partition
    pub fn with_target(mut self, target: Partition) -> Self {
        self.target = Some(target);
        self
    }
}

/// Configuration for [`crate::direct::direct_copy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectCopyConfig {
    /// Region holding the image, usually inside the running program
    pub source: Region,
    /// Region the image is copied to
    pub destination: Region,
    /// Number of bytes to copy from the start of `source`
    pub size: u32,
}

impl DirectCopyConfig {
    /// Copy the whole of `source` into `destination`
    pub fn new(source: Region, destination: Region) -> Self {
        Self {
            source,
            destination,
            size: source.size,
        }
    }

    /// Copy only the first `size` bytes of the source
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }
}
