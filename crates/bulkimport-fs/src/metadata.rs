//! Sidecar metadata files
//!
//! Metadata for an entry lives next to it in `<entry name><suffix>`, by default
//! `report.2.txt.metadata.json`. The file holds a JSON object whose values are
//! either a string or an array of strings:
//!
//! ```json
//! { "cm:title": "Annual report", "cm:taggable": ["finance", "2024"] }
//! ```

use bulkimport_types::Properties;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Parameter overriding the sidecar suffix
pub const PARAM_METADATA_SUFFIX: &str = "metadata-suffix";

/// Default sidecar suffix
pub const DEFAULT_METADATA_SUFFIX: &str = ".metadata.json";

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("cannot read metadata file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed metadata file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SidecarValue {
    One(String),
    Many(Vec<String>),
}

/// Entry name a sidecar belongs to, if `file_name` is a sidecar
pub fn sidecar_subject<'a>(file_name: &'a str, suffix: &str) -> Option<&'a str> {
    file_name
        .strip_suffix(suffix)
        .filter(|subject| !subject.is_empty())
}

/// Decode sidecar bytes into item properties
pub fn parse_sidecar(bytes: &[u8]) -> Result<Properties, SidecarError> {
    let raw: BTreeMap<String, SidecarValue> = serde_json::from_slice(bytes)?;

    Ok(raw
        .into_iter()
        .map(|(name, value)| {
            let values = match value {
                SidecarValue::One(value) => vec![value],
                SidecarValue::Many(values) => values,
            };
            (name, values)
        })
        .collect())
}

pub async fn read_sidecar(path: &Path) -> Result<Properties, SidecarError> {
    let bytes = tokio::fs::read(path).await?;
    parse_sidecar(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_subject() {
        assert_eq!(
            sidecar_subject("report.2.txt.metadata.json", DEFAULT_METADATA_SUFFIX),
            Some("report.2.txt")
        );
        assert_eq!(
            sidecar_subject(".metadata.json", DEFAULT_METADATA_SUFFIX),
            None
        );
        assert_eq!(sidecar_subject("report.txt", DEFAULT_METADATA_SUFFIX), None);
    }

    #[test]
    fn test_parse_single_and_multi_values() {
        let properties =
            parse_sidecar(br#"{"cm:title": "Annual report", "cm:taggable": ["finance", "2024"]}"#)
                .unwrap();

        assert_eq!(properties.first("cm:title"), Some("Annual report"));
        assert_eq!(properties.get("cm:taggable").map(|v| v.len()), Some(2));
    }

    #[test]
    fn test_parse_rejects_non_string_values() {
        assert!(matches!(
            parse_sidecar(br#"{"cm:size": 42}"#),
            Err(SidecarError::Parse(_))
        ));
        assert!(matches!(
            parse_sidecar(b"not json"),
            Err(SidecarError::Parse(_))
        ));
    }
}
