//! Transport abstraction for fetching update images
//!
//! A transport yields the image as a byte stream. The engine drives it
//! through a fixed sequence: open, fetch headers, read until the stream
//! ends, close. Errors use `embedded_io` error kinds so the engine can tell
//! a dropped connection from any other read failure without knowing the
//! concrete transport.

use embedded_io::{ErrorKind, ErrorType};
use maybe_async::maybe_async;

/// HTTP-style status code for a successful request
pub const STATUS_OK: u16 = 200;

/// Byte-stream source for update images
///
/// Implementations hold at most one open connection at a time.
#[maybe_async(AFIT)]
pub trait Transport: ErrorType {
    /// Per-download configuration (URL, credentials, ...)
    type Config;

    /// Open a connection using `config`
    async fn open(&mut self, config: &Self::Config) -> Result<(), Self::Error>;

    /// Send the request and read the response headers
    ///
    /// Returns the status code; `STATUS_OK` means the body follows.
    async fn fetch_headers(&mut self) -> Result<u16, Self::Error>;

    /// Body length announced by the headers, if any
    fn content_length(&self) -> Option<u32> {
        None
    }

    /// Read the next chunk of the body
    ///
    /// Returns 0 when no data is currently available, which is not by
    /// itself the end of the stream (see `is_complete` / `is_connected`).
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Whether the whole body has been received
    fn is_complete(&self) -> bool;

    /// Whether the connection is still open
    fn is_connected(&self) -> bool;

    /// Tear down the connection
    ///
    /// Must be safe to call more than once and on a connection that failed
    /// to open.
    fn close(&mut self);
}

/// Whether a transport error means the peer went away
pub fn is_connection_closed<E: embedded_io::Error>(error: &E) -> bool {
    matches!(
        error.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::NotConnected
    )
}

/// Closes the transport when dropped
///
/// Holding one of these for the lifetime of a download guarantees the
/// connection is torn down on every exit path.
pub struct Connection<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> Connection<'a, T> {
    /// Take responsibility for closing `transport`
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }
}

impl<T: Transport + ?Sized> core::ops::Deref for Connection<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: Transport + ?Sized> core::ops::DerefMut for Connection<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: Transport + ?Sized> Drop for Connection<'_, T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Kind(ErrorKind);

    impl embedded_io::Error for Kind {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    #[test]
    fn test_connection_closed_kinds() {
        assert!(is_connection_closed(&Kind(ErrorKind::ConnectionReset)));
        assert!(is_connection_closed(&Kind(ErrorKind::NotConnected)));
        assert!(!is_connection_closed(&Kind(ErrorKind::TimedOut)));
        assert!(!is_connection_closed(&Kind(ErrorKind::Other)));
    }
}
