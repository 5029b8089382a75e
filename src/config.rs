//! Offset configuration (`offsets.json`).
//!
//! The file names the target executable and describes the pointer chain:
//!
//! ```json
//! {
//!   "process_name": "ElementClient.exe",
//!   "offsets": {
//!     "char_origin": "0x13FAB08",
//!     "char_base_offsets": [104],
//!     "health_offset": "0x6BC",
//!     "mana_offset": "0x6C0"
//!   }
//! }
//! ```
//!
//! Every hex string is parsed when the file is loaded, so reads never touch text.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default configuration file, relative to the current working directory.
pub const CONFIG_FILE: &str = "offsets.json";

/// Key of the health value's final offset.
pub const HEALTH_OFFSET: &str = "health_offset";

/// Key of the mana value's final offset.
pub const MANA_OFFSET: &str = "mana_offset";

#[derive(Debug, Deserialize)]
struct RawConfig {
    process_name: String,
    offsets: RawOffsets,
}

#[derive(Debug, Deserialize)]
struct RawOffsets {
    char_origin: RawOffset,
    char_base_offsets: Vec<RawOffset>,
    #[serde(flatten)]
    named: HashMap<String, RawOffset>,
}

/// An offset as written in the file: a hex string or a plain integer.
///
/// Negative integers wrap, so adding one to an address walks backwards.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOffset {
    Number(u64),
    Signed(i64),
    Hex(String),
}

impl RawOffset {
    fn parse(&self, name: &str) -> Result<usize> {
        let invalid = || Error::InvalidOffset {
            name: name.to_string(),
            value: match self {
                RawOffset::Number(n) => n.to_string(),
                RawOffset::Signed(n) => n.to_string(),
                RawOffset::Hex(s) => s.clone(),
            },
        };

        match self {
            RawOffset::Number(n) => usize::try_from(*n).map_err(|_| invalid()),
            RawOffset::Signed(n) => isize::try_from(*n)
                .map(|n| n as usize)
                .map_err(|_| invalid()),
            RawOffset::Hex(s) => parse_hex(s).ok_or_else(invalid),
        }
    }
}

/// Parses `"0x6BC"`, `"6bc"` or `" 0X6BC "` as hexadecimal.
pub fn parse_hex(text: &str) -> Option<usize> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() {
        return None;
    }
    usize::from_str_radix(digits, 16).ok()
}

/// Parsed contents of an offsets file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetConfig {
    /// Executable file name of the target, matched exactly.
    pub process_name: String,
    /// Distance from the module base to the root pointer.
    pub char_origin: usize,
    /// Pointer-chain hops, nearest the root first.
    pub char_base_offsets: Vec<usize>,
    /// Final offsets by name, e.g. `health_offset`.
    pub named: HashMap<String, usize>,
}

impl OffsetConfig {
    /// Load from [`CONFIG_FILE`] in the current working directory.
    pub fn load() -> Result<Self> {
        Self::load_from_path(CONFIG_FILE)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = content.parse::<OffsetConfig>()?;
        debug!(
            "loaded offsets from {}: process={} origin={:#x} hops={} named={}",
            path.display(),
            config.process_name,
            config.char_origin,
            config.char_base_offsets.len(),
            config.named.len()
        );
        Ok(config)
    }

    /// Final offset registered under `name`.
    pub fn named_offset(&self, name: &str) -> Result<usize> {
        self.named
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownOffset(name.to_string()))
    }
}

impl FromStr for OffsetConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(s)?;

        let char_origin = raw.offsets.char_origin.parse("char_origin")?;
        let char_base_offsets = raw
            .offsets
            .char_base_offsets
            .iter()
            .enumerate()
            .map(|(i, hop)| hop.parse(&format!("char_base_offsets[{}]", i)))
            .collect::<Result<Vec<_>>>()?;
        let named = raw
            .offsets
            .named
            .iter()
            .map(|(name, offset)| Ok((name.clone(), offset.parse(name)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(OffsetConfig {
            process_name: raw.process_name,
            char_origin,
            char_base_offsets,
            named,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "process_name": "ElementClient.exe",
        "offsets": {
            "char_origin": "0x13FAB08",
            "char_base_offsets": [104, 16],
            "health_offset": "6BC",
            "mana_offset": "0x6C0"
        }
    }"#;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x6BC"), Some(0x6bc));
        assert_eq!(parse_hex("6bc"), Some(0x6bc));
        assert_eq!(parse_hex(" 0X13FAB08 "), Some(0x13f_ab08));
        assert_eq!(parse_hex("0x"), None);
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("xyz"), None);
    }

    #[test]
    fn test_parse_sample() {
        let config: OffsetConfig = SAMPLE.parse().unwrap();
        assert_eq!(config.process_name, "ElementClient.exe");
        assert_eq!(config.char_origin, 0x13f_ab08);
        assert_eq!(config.char_base_offsets, vec![104, 16]);
        assert_eq!(config.named_offset(HEALTH_OFFSET).unwrap(), 0x6bc);
        assert_eq!(config.named_offset(MANA_OFFSET).unwrap(), 0x6c0);
        assert_eq!(config.named.len(), 2);
    }

    #[test]
    fn test_hops_may_be_hex_strings() {
        let config: OffsetConfig = r#"{
            "process_name": "game",
            "offsets": { "char_origin": "10", "char_base_offsets": ["0x68", 8] }
        }"#
        .parse()
        .unwrap();
        assert_eq!(config.char_base_offsets, vec![0x68, 8]);
        assert!(config.named.is_empty());
    }

    #[test]
    fn test_negative_hops_wrap() {
        let config: OffsetConfig = r#"{
            "process_name": "game",
            "offsets": { "char_origin": "10", "char_base_offsets": [104, -8] }
        }"#
        .parse()
        .unwrap();
        assert_eq!(config.char_base_offsets, vec![104, (-8isize) as usize]);
        assert_eq!(0x2000usize.wrapping_add(config.char_base_offsets[1]), 0x1ff8);
    }

    #[test]
    fn test_unknown_named_offset() {
        let config: OffsetConfig = SAMPLE.parse().unwrap();
        match config.named_offset("stamina_offset") {
            Err(Error::UnknownOffset(name)) => assert_eq!(name, "stamina_offset"),
            other => panic!("expected UnknownOffset, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_hex_is_rejected_at_load() {
        let err = r#"{
            "process_name": "game",
            "offsets": { "char_origin": "0x10", "char_base_offsets": [], "health_offset": "0xZZ" }
        }"#
        .parse::<OffsetConfig>()
        .unwrap_err();
        match err {
            Error::InvalidOffset { name, value } => {
                assert_eq!(name, "health_offset");
                assert_eq!(value, "0xZZ");
            }
            other => panic!("expected InvalidOffset, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            "{ not json".parse::<OffsetConfig>(),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            r#"{ "offsets": {} }"#.parse::<OffsetConfig>(),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = OffsetConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.process_name, "ElementClient.exe");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = OffsetConfig::load_from_path(dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(err.is_not_found());
    }
}
