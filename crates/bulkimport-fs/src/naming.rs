//! Version marker grammar for file names
//!
//! Two schemes are supported, selected with the `version-scheme` parameter:
//!
//! - `infix` (default): `<base>.<N>.<ext>` is version `N` of `<base>.<ext>`,
//!   e.g. `report.2.txt` is version 2 of `report.txt`.
//! - `suffix`: `<name>.v<N>` is version `N` of `<name>`,
//!   e.g. `report.txt.v2` is version 2 of `report.txt`.
//!
//! In both schemes `<N>` is a decimal integer of 1 to 9 digits, at least 1,
//! without leading zeros, and every other part is non-empty. A name that does
//! not match is version 1 of itself. Directory names never carry a marker.

use bulkimport_types::{ConfigurationError, Version};
use std::fmt;
use std::str::FromStr;

/// Parameter selecting the version grammar
pub const PARAM_VERSION_SCHEME: &str = "version-scheme";

const MAX_VERSION_DIGITS: usize = 9;

/// Supported version marker grammars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionScheme {
    #[default]
    Infix,
    Suffix,
}

/// A file name split into logical name and version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedName {
    pub logical: String,
    pub version: Version,
}

impl VersionScheme {
    pub fn as_str(&self) -> &str {
        match self {
            VersionScheme::Infix => "infix",
            VersionScheme::Suffix => "suffix",
        }
    }

    pub fn parse_name(&self, file_name: &str) -> VersionedName {
        let parsed = match self {
            VersionScheme::Infix => parse_infix(file_name),
            VersionScheme::Suffix => parse_suffix(file_name),
        };

        parsed.unwrap_or_else(|| VersionedName {
            logical: file_name.to_string(),
            version: Version::INITIAL,
        })
    }
}

impl FromStr for VersionScheme {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "infix" => Ok(VersionScheme::Infix),
            "suffix" => Ok(VersionScheme::Suffix),
            other => Err(ConfigurationError::invalid(
                PARAM_VERSION_SCHEME,
                format!("expected 'infix' or 'suffix', got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for VersionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn parse_infix(file_name: &str) -> Option<VersionedName> {
    let mut parts = file_name.rsplitn(3, '.');
    let ext = parts.next()?;
    let marker = parts.next()?;
    let base = parts.next()?;

    if base.is_empty() || ext.is_empty() {
        return None;
    }

    Some(VersionedName {
        logical: format!("{}.{}", base, ext),
        version: parse_marker(marker)?,
    })
}

fn parse_suffix(file_name: &str) -> Option<VersionedName> {
    let (name, marker) = file_name.rsplit_once(".v")?;
    if name.is_empty() {
        return None;
    }

    Some(VersionedName {
        logical: name.to_string(),
        version: parse_marker(marker)?,
    })
}

fn parse_marker(marker: &str) -> Option<Version> {
    if marker.is_empty()
        || marker.len() > MAX_VERSION_DIGITS
        || marker.starts_with('0')
        || !marker.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    marker.parse::<u64>().ok().map(Version::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infix(name: &str) -> (String, u64) {
        let parsed = VersionScheme::Infix.parse_name(name);
        (parsed.logical, parsed.version.get())
    }

    fn suffix(name: &str) -> (String, u64) {
        let parsed = VersionScheme::Suffix.parse_name(name);
        (parsed.logical, parsed.version.get())
    }

    #[test]
    fn test_infix_markers() {
        assert_eq!(infix("report.txt"), ("report.txt".to_string(), 1));
        assert_eq!(infix("report.2.txt"), ("report.txt".to_string(), 2));
        assert_eq!(infix("report.1.txt"), ("report.txt".to_string(), 1));
        assert_eq!(infix("a.b.13.tar"), ("a.b.tar".to_string(), 13));
    }

    #[test]
    fn test_infix_non_markers() {
        assert_eq!(infix("archive.tar.gz"), ("archive.tar.gz".to_string(), 1));
        assert_eq!(infix("report.02.txt"), ("report.02.txt".to_string(), 1));
        assert_eq!(infix("report.0.txt"), ("report.0.txt".to_string(), 1));
        assert_eq!(infix(".2.txt"), (".2.txt".to_string(), 1));
        assert_eq!(infix("report.2."), ("report.2.".to_string(), 1));
        assert_eq!(infix("2.txt"), ("2.txt".to_string(), 1));
        assert_eq!(
            infix("big.1234567890.bin"),
            ("big.1234567890.bin".to_string(), 1)
        );
    }

    #[test]
    fn test_suffix_markers() {
        assert_eq!(suffix("report.txt.v3"), ("report.txt".to_string(), 3));
        assert_eq!(suffix("report.txt"), ("report.txt".to_string(), 1));
        assert_eq!(suffix("report.2.txt"), ("report.2.txt".to_string(), 1));
        assert_eq!(suffix(".v2"), (".v2".to_string(), 1));
        assert_eq!(suffix("notes.vx"), ("notes.vx".to_string(), 1));
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!(
            "Suffix".parse::<VersionScheme>().unwrap(),
            VersionScheme::Suffix
        );
        assert!("numeric".parse::<VersionScheme>().is_err());
    }
}
