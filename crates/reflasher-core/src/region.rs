//! Address region geometry
//!
//! Pure address-range arithmetic over the flat physical address space. All
//! end computations are done in `u64` so regions touching the top of the
//! 32-bit space never wrap.

use core::fmt;

/// A contiguous range of the physical address space
///
/// The range is half-open, `[address, address + size)`, for I/O purposes.
/// The overlap test treats both ends as inclusive (see [`Region::overlaps`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    /// Start address
    pub address: u32,
    /// Length in bytes
    pub size: u32,
}

impl Region {
    /// Create a new region
    pub const fn new(address: u32, size: u32) -> Self {
        Self { address, size }
    }

    /// One past the last byte of the region
    pub fn end(&self) -> u64 {
        self.address as u64 + self.size as u64
    }

    /// Whether the region covers no bytes
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Check if an address is within this region
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.address && (addr as u64) < self.end()
    }

    /// Check if `other` lies entirely within this region
    pub fn contains_region(&self, other: &Region) -> bool {
        other.address >= self.address && other.end() <= self.end()
    }

    /// Check if this region overlaps with another
    ///
    /// Both ends are inclusive, so two regions that merely touch
    /// (`a.end() == b.address`) count as overlapping. An erase that ends
    /// exactly where a staging partition starts is still refused.
    pub fn overlaps(&self, other: &Region) -> bool {
        let (a_start, a_end) = (self.address as u64, self.end());
        let (b_start, b_end) = (other.address as u64, other.end());
        a_start <= b_end && b_start <= a_end
    }

    /// Check if this region is aligned to the given boundary
    pub fn is_aligned(&self, alignment: u32) -> bool {
        alignment != 0
            && self.address % alignment == 0
            && self.size % alignment == 0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}..0x{:08X}", self.address, self.end())
    }
}
