//! Error types for the HTTP transport

use embedded_io::ErrorKind;
use thiserror::Error;

/// HTTP transport errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// The URL is not an http:// or https:// URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An operation needed an open connection
    #[error("No connection open")]
    NotOpen,

    /// The HTTP client failed (connect, TLS, request or body)
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Reading the response body failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for HTTP transport operations
pub type Result<T> = core::result::Result<T, HttpError>;

impl embedded_io::Error for HttpError {
    fn kind(&self) -> ErrorKind {
        match self {
            HttpError::InvalidUrl(_) => ErrorKind::InvalidInput,
            HttpError::NotOpen => ErrorKind::NotConnected,
            HttpError::Client(e) if e.is_timeout() => ErrorKind::TimedOut,
            HttpError::Client(e) if e.is_connect() => ErrorKind::ConnectionRefused,
            HttpError::Client(_) => ErrorKind::Other,
            HttpError::Io(e) => io_kind(e.kind()),
        }
    }
}

fn io_kind(kind: std::io::ErrorKind) -> ErrorKind {
    use std::io::ErrorKind as Io;

    match kind {
        Io::ConnectionReset => ErrorKind::ConnectionReset,
        Io::ConnectionAborted | Io::UnexpectedEof | Io::BrokenPipe => ErrorKind::ConnectionAborted,
        Io::NotConnected => ErrorKind::NotConnected,
        Io::TimedOut | Io::WouldBlock => ErrorKind::TimedOut,
        Io::InvalidData => ErrorKind::InvalidData,
        Io::Interrupted => ErrorKind::Interrupted,
        _ => ErrorKind::Other,
    }
}
