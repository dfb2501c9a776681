//! TOML partition table parsing
//!
//! Parses partition tables written as TOML:
//!
//! ```toml
//! [[partition]]
//! label = "nvs"
//! type = "data"
//! subtype = 0x02
//! offset = 0x9000
//! size = "24 KiB"
//!
//! [[partition]]
//! label = "ota_0"
//! type = "app"
//! subtype = "ota_0"
//! offset = 0x10000
//! size = "1 MiB"
//! readonly = false
//! ```

use std::fs;
use std::path::Path;
use std::string::String;
use std::vec::Vec;
use std::format;

use super::binary::PartitionTableError;
use super::table::PartitionTable;
use super::types::{AppSubtype, Partition, PartitionFlags, PartitionKind, OTA_SLOT_COUNT};

/// TOML partition table file structure
#[derive(Debug, serde::Deserialize)]
struct TomlTableFile {
    partition: Vec<TomlPartition>,
}

/// Partition definition in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlPartition {
    #[serde(default)]
    label: String,
    #[serde(rename = "type")]
    kind: String,
    subtype: Option<NumberOrName>,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    offset: u32,
    #[serde(deserialize_with = "deserialize_size")]
    size: u32,
    #[serde(default)]
    readonly: bool,
    #[serde(default)]
    encrypted: bool,
}

/// A value that can be a number or a symbolic name
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum NumberOrName {
    Int(u32),
    Str(String),
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match NumberOrName::deserialize(deserializer)? {
        NumberOrName::Int(n) => Ok(n),
        NumberOrName::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

/// Deserialize a size that can carry a KiB/MiB suffix
fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match NumberOrName::deserialize(deserializer)? {
        NumberOrName::Int(n) => Ok(n),
        NumberOrName::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "64 KiB", "0x10000" or "4096"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("m") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("k") {
        (n.trim(), 1024)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

/// Resolve an app subtype given as a number or as "factory", "test", "ota_N"
fn parse_app_subtype(subtype: &NumberOrName) -> Result<AppSubtype, String> {
    match subtype {
        NumberOrName::Int(n) => u8::try_from(*n)
            .map(AppSubtype::from_raw)
            .map_err(|_| format!("subtype out of range: {}", n)),
        NumberOrName::Str(s) => {
            let s = s.trim().to_lowercase();
            match s.as_str() {
                "factory" => Ok(AppSubtype::Factory),
                "test" => Ok(AppSubtype::Test),
                _ => {
                    let slot: u8 = s
                        .strip_prefix("ota_")
                        .and_then(|n| n.parse().ok())
                        .ok_or_else(|| format!("unknown app subtype: {}", s))?;
                    if slot >= OTA_SLOT_COUNT {
                        return Err(format!("OTA slot out of range: {}", slot));
                    }
                    Ok(AppSubtype::Ota(slot))
                }
            }
        }
    }
}

/// Resolve a numeric subtype for data and custom partitions
fn parse_raw_subtype(subtype: Option<&NumberOrName>) -> Result<u8, String> {
    match subtype {
        None => Ok(0),
        Some(NumberOrName::Int(n)) => {
            u8::try_from(*n).map_err(|_| format!("subtype out of range: {}", n))
        }
        Some(NumberOrName::Str(s)) => {
            let n = parse_number(s)?;
            u8::try_from(n).map_err(|_| format!("subtype out of range: {}", n))
        }
    }
}

fn to_partition(entry: TomlPartition) -> Result<Partition, String> {
    let kind = match entry.kind.trim().to_lowercase().as_str() {
        "app" => {
            let subtype = entry
                .subtype
                .as_ref()
                .map(parse_app_subtype)
                .transpose()?
                .unwrap_or(AppSubtype::Factory);
            PartitionKind::App(subtype)
        }
        "data" => PartitionKind::Data(parse_raw_subtype(entry.subtype.as_ref())?),
        other => {
            let raw = parse_number(other)?;
            let raw = u8::try_from(raw).map_err(|_| format!("type out of range: {}", raw))?;
            PartitionKind::from_raw(raw, parse_raw_subtype(entry.subtype.as_ref())?)
        }
    };

    let mut flags = PartitionFlags::empty();
    flags.set(PartitionFlags::READONLY, entry.readonly);
    flags.set(PartitionFlags::ENCRYPTED, entry.encrypted);

    Ok(Partition::new(kind, entry.offset, entry.size)
        .with_label(&entry.label)
        .with_flags(flags))
}

impl PartitionTable {
    /// Load a partition table from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, PartitionTableError> {
        let content = fs::read_to_string(path).map_err(|_| PartitionTableError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parse a partition table from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, PartitionTableError> {
        let file: TomlTableFile = toml::from_str(content).map_err(|e| {
            log::error!("Failed to parse partition table: {}", e);
            PartitionTableError::ParseError
        })?;

        let mut table = PartitionTable::new();
        for entry in file.partition {
            let partition = to_partition(entry).map_err(|e| {
                log::error!("Invalid partition entry: {}", e);
                PartitionTableError::ParseError
            })?;
            table
                .push(partition)
                .map_err(|_| PartitionTableError::TooManyEntries)?;
        }

        table.validate()?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("4 KiB").unwrap(), 4096);
        assert_eq!(parse_size("64K").unwrap(), 64 * 1024);
        assert_eq!(parse_size("1 MiB").unwrap(), 1024 * 1024);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("8192 MiB").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[[partition]]
label = "nvs"
type = "data"
subtype = 0x02
offset = 0x9000
size = "24 KiB"

[[partition]]
label = "factory"
type = "app"
subtype = "factory"
offset = "0x10000"
size = "64 KiB"

[[partition]]
label = "ota_0"
type = "app"
subtype = "ota_0"
offset = 0x20000
size = 0x10000

[[partition]]
label = "ota_1"
type = "app"
subtype = "ota_1"
offset = 0x30000
size = "64 KiB"
readonly = true
"#;
        let table = PartitionTable::from_toml_str(toml).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.find_by_label("nvs").unwrap().size, 24 * 1024);
        assert_eq!(
            table.find_by_label("factory").unwrap().kind,
            PartitionKind::App(AppSubtype::Factory)
        );
        assert_eq!(table.ota_slot(0).unwrap().address, 0x20000);
        assert!(table.ota_slot(1).unwrap().is_readonly());
    }

    #[test]
    fn test_unknown_subtype_rejected() {
        let toml = r#"
[[partition]]
label = "weird"
type = "app"
subtype = "ota_99"
offset = 0x10000
size = 0x1000
"#;
        assert_eq!(
            PartitionTable::from_toml_str(toml).unwrap_err(),
            PartitionTableError::ParseError
        );
    }
}
