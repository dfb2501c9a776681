//! Error types for reflasher-core
//!
//! This module provides a no_std compatible error type that is shared by the
//! partition selector, the session engine and the direct copier. Every
//! variant that relates to a flash access carries the offending address so
//! the caller can log something meaningful before aborting.

use core::fmt;

use crate::session::SessionState;

/// Details about a failed transport read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailure {
    /// The transport reported an error while streaming the body
    Stream {
        /// Bytes received before the failure
        received: u32,
    },
    /// The peer closed or reset the connection mid-transfer
    ConnectionClosed {
        /// Bytes received before the connection went away
        received: u32,
    },
    /// The stream ended but the transport did not see the whole body
    Incomplete {
        /// Bytes received before the stream ended
        received: u32,
    },
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Argument and state errors
    /// A required configuration value is missing or malformed
    InvalidArgument,
    /// Operation is not allowed in the current session state
    InvalidState(SessionState),
    /// Every candidate storage partition overlaps the destination
    NoSuitablePartition,
    /// Fixed-capacity storage (e.g. the partition table) is exhausted
    AllocationFailure,

    // Transport errors
    /// The transport could not open a connection
    TransportOpenFailure,
    /// The transport answered with a non-success status
    TransportProtocolFailure {
        /// Status code returned by the remote end
        status: u16,
    },
    /// Reading the payload failed
    TransportReadFailure(ReadFailure),

    // Capacity errors
    /// The image does not fit where it is supposed to go
    SizeOverflow {
        /// Bytes that would be needed
        required: u32,
        /// Bytes actually available
        capacity: u32,
    },

    // Flash errors
    /// Erasing a flash range failed
    FlashEraseFailure {
        /// Physical start address of the erase
        addr: u32,
        /// Length of the erase
        len: u32,
    },
    /// Reading from flash failed
    FlashReadFailure {
        /// Physical address of the failed read
        addr: u32,
    },
    /// Writing to flash failed
    FlashWriteFailure {
        /// Physical address of the failed write
        addr: u32,
    },

    // Device errors, reported by `FlashDevice` implementations
    /// Address is beyond the flash device
    AddressOutOfBounds,
    /// Operation requires an aligned address or size
    InvalidAlignment,
    /// Target range is write protected
    WriteProtected,
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { received } => {
                write!(f, "stream read failed after {} bytes", received)
            }
            Self::ConnectionClosed { received } => {
                write!(f, "connection closed after {} bytes", received)
            }
            Self::Incomplete { received } => {
                write!(f, "incomplete transfer: only {} bytes received", received)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::InvalidState(state) => write!(f, "operation not allowed in state {:?}", state),
            Self::NoSuitablePartition => {
                write!(f, "no storage partition found that avoids the destination")
            }
            Self::AllocationFailure => write!(f, "out of storage capacity"),
            Self::TransportOpenFailure => write!(f, "failed to open transport connection"),
            Self::TransportProtocolFailure { status } => {
                write!(f, "request failed with status {}", status)
            }
            Self::TransportReadFailure(failure) => write!(f, "{}", failure),
            Self::SizeOverflow { required, capacity } => write!(
                f,
                "image needs {} bytes but only {} bytes are available",
                required, capacity
            ),
            Self::FlashEraseFailure { addr, len } => write!(
                f,
                "failed to erase 0x{:X} bytes at address 0x{:08X}",
                len, addr
            ),
            Self::FlashReadFailure { addr } => {
                write!(f, "failed to read flash at address 0x{:08X}", addr)
            }
            Self::FlashWriteFailure { addr } => {
                write!(f, "failed to write flash at address 0x{:08X}", addr)
            }
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::WriteProtected => write!(f, "range is write protected"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
