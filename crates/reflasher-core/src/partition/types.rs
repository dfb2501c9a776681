//! Partition types
//!
//! Core types describing partition table entries. These work in no_std
//! environments; labels are stored inline.

use core::fmt;

use bitflags::bitflags;
use heapless::String;

use crate::region::Region;

/// Maximum label length in bytes
pub const LABEL_LEN: usize = 16;

/// Number of OTA application slots the table format can describe
pub const OTA_SLOT_COUNT: u8 = 16;

/// First subtype value used by OTA slots
const OTA_SUBTYPE_BASE: u8 = 0x10;

/// Partition label
pub type Label = String<LABEL_LEN>;

bitflags! {
    /// Partition flags, as stored in the binary partition table
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PartitionFlags: u32 {
        /// Contents are encrypted at rest
        const ENCRYPTED = 1 << 0;
        /// Partition must never be written or erased
        const READONLY  = 1 << 1;
    }
}

/// Application partition subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppSubtype {
    /// Factory application image
    Factory,
    /// OTA slot `n` (0..16)
    Ota(u8),
    /// Test application image
    Test,
    /// Subtype not known to this crate
    Other(u8),
}

impl AppSubtype {
    /// Decode from the raw subtype byte
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => Self::Factory,
            0x20 => Self::Test,
            n if (OTA_SUBTYPE_BASE..OTA_SUBTYPE_BASE + OTA_SLOT_COUNT).contains(&n) => {
                Self::Ota(n - OTA_SUBTYPE_BASE)
            }
            other => Self::Other(other),
        }
    }

    /// Encode to the raw subtype byte
    pub fn to_raw(self) -> u8 {
        match self {
            Self::Factory => 0x00,
            Self::Test => 0x20,
            Self::Ota(n) => OTA_SUBTYPE_BASE + n,
            Self::Other(raw) => raw,
        }
    }
}

/// Partition classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    /// Application image (factory, OTA slot, test)
    App(AppSubtype),
    /// Data partition with its raw subtype
    Data(u8),
    /// Any other partition type, with raw type and subtype
    Custom(u8, u8),
}

impl PartitionKind {
    /// Decode from raw type and subtype bytes
    pub fn from_raw(kind: u8, subtype: u8) -> Self {
        match kind {
            0x00 => Self::App(AppSubtype::from_raw(subtype)),
            0x01 => Self::Data(subtype),
            other => Self::Custom(other, subtype),
        }
    }

    /// Raw type byte
    pub fn raw_type(&self) -> u8 {
        match self {
            Self::App(_) => 0x00,
            Self::Data(_) => 0x01,
            Self::Custom(kind, _) => *kind,
        }
    }

    /// Raw subtype byte
    pub fn raw_subtype(&self) -> u8 {
        match self {
            Self::App(sub) => sub.to_raw(),
            Self::Data(sub) | Self::Custom(_, sub) => *sub,
        }
    }

    /// OTA slot number, if this is an OTA application slot
    pub fn ota_slot(&self) -> Option<u8> {
        match self {
            Self::App(AppSubtype::Ota(n)) => Some(*n),
            _ => None,
        }
    }

    /// Whether this is any kind of application partition
    pub fn is_app(&self) -> bool {
        matches!(self, Self::App(_))
    }
}

/// Type filter used when searching the partition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    /// Application partitions
    App,
    /// Data partitions
    Data,
    /// Custom partition type byte
    Custom(u8),
}

impl PartitionType {
    /// Whether `kind` belongs to this type
    pub fn matches(&self, kind: &PartitionKind) -> bool {
        match (self, kind) {
            (Self::App, PartitionKind::App(_)) => true,
            (Self::Data, PartitionKind::Data(_)) => true,
            (Self::Custom(a), PartitionKind::Custom(b, _)) => a == b,
            _ => false,
        }
    }
}

/// An entry of the partition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Partition label (may be empty)
    pub label: Label,
    /// Type and subtype
    pub kind: PartitionKind,
    /// Physical start address
    pub address: u32,
    /// Size in bytes
    pub size: u32,
    /// Flags
    pub flags: PartitionFlags,
}

impl Partition {
    /// Create a new unlabeled partition
    pub fn new(kind: PartitionKind, address: u32, size: u32) -> Self {
        Self {
            label: Label::new(),
            kind,
            address,
            size,
            flags: PartitionFlags::empty(),
        }
    }

    /// Create an OTA application slot
    pub fn ota(slot: u8, address: u32, size: u32) -> Self {
        Self::new(PartitionKind::App(AppSubtype::Ota(slot)), address, size)
    }

    /// Set the label, truncating at a character boundary if it is too long
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = truncate_label(label);
        self
    }

    /// Set the flags
    pub fn with_flags(mut self, flags: PartitionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The physical region covered by this partition
    pub fn region(&self) -> Region {
        Region::new(self.address, self.size)
    }

    /// Whether this partition overlaps `region`
    pub fn overlaps(&self, region: &Region) -> bool {
        self.region().overlaps(region)
    }

    /// Whether writes and erases are forbidden
    pub fn is_readonly(&self) -> bool {
        self.flags.contains(PartitionFlags::READONLY)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.label.is_empty() {
            "<unlabeled>"
        } else {
            self.label.as_str()
        };
        write!(f, "{} ({:?}) at {}", label, self.kind, self.region())
    }
}

/// Copy at most `LABEL_LEN` bytes of `label`, cut at a char boundary
pub(crate) fn truncate_label(label: &str) -> Label {
    let mut out = Label::new();
    for ch in label.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
