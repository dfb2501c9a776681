//! reflasher-dummy - In-memory collaborators for the reflash engine
//!
//! This crate provides a flash emulator and a scripted transport so the
//! engine can be exercised without hardware or a network. The host CLI uses
//! the emulator to operate on flash image files.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
mod flash;
#[cfg(feature = "alloc")]
mod transport;

#[cfg(feature = "alloc")]
pub use flash::{DummyConfig, DummyFlash, Fault, FlashOp};
#[cfg(feature = "alloc")]
pub use transport::{Script, ScriptedTransport, Step};
