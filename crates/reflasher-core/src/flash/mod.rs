//! Flash access
//!
//! The engine reaches the flash through the [`FlashDevice`] trait and the
//! checked helpers in [`access`].

pub mod access;
mod device;

pub use device::{FlashDevice, ERASED_VALUE};
