//! reflasher-core - Core engine for firmware self-reflashing
//!
//! This crate lets a running firmware image replace itself or another
//! region of the same flash. It picks a storage partition that does not
//! overlap the destination, streams the new image into it, and copies it to
//! the destination afterwards. It is `no_std` compatible and reaches the
//! hardware only through the [`flash::FlashDevice`] and
//! [`transport::Transport`] traits.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, TOML
//!   partition tables and `std::error::Error` impls)
//! - `alloc` - Enable heap allocation
//! - `is_sync` - Blocking traits (default); without it the traits are async
//!
//! # Example
//!
//! ```ignore
//! use reflasher_core::{Region, ReflashSession, SessionConfig};
//!
//! let config = SessionConfig::new(Region::new(0x1000, 0x8000), url);
//! let mut session = ReflashSession::init(&mut flash, &mut http, &table, pc, config)?;
//! session.download()?;
//! session.copy_to_region()?;
//! session.finish();
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod direct;
pub mod error;
pub mod flash;
pub mod partition;
pub mod progress;
pub mod region;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use direct::{direct_copy, direct_copy_with_progress};
pub use error::{Error, ReadFailure, Result};
pub use region::Region;
pub use session::{
    DirectCopyConfig, ReflashSession, SessionConfig, SessionState, SessionSummary, CHUNK_SIZE,
};
