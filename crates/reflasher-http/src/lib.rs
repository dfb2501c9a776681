//! reflasher-http - HTTP(S) image transport
//!
//! This crate implements [`reflasher_core::transport::Transport`] on top of a
//! blocking `reqwest` client, so a host can feed a reflash session from a web
//! server.
//!
//! # Example
//!
//! ```no_run
//! use reflasher_core::transport::Transport;
//! use reflasher_http::{HttpConfig, HttpTransport};
//!
//! let mut http = HttpTransport::new()?;
//! http.open(&HttpConfig::parse("http://192.168.1.10/app.bin")?)?;
//! let status = http.fetch_headers()?;
//! println!("status {}", status);
//! http.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod transport;

// Re-exports
pub use error::{HttpError, Result};
pub use transport::{HttpConfig, HttpTransport, DEFAULT_TIMEOUT};
