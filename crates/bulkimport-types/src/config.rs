//! Source configuration
//!
//! Sources are configured with a mapping from parameter name to one or more
//! string values. Repeated keys accumulate values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigurationError;

/// Parameter set handed to [`ImportSource::open`](crate::ImportSource::open)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceConfig(BTreeMap<String, Vec<String>>);

impl SourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`push`](Self::push)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// Add a value, keeping any earlier values of the same parameter
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Merge another parameter set into this one
    pub fn extend(&mut self, other: SourceConfig) {
        for (name, values) in other.0 {
            self.0.entry(name).or_default().extend(values);
        }
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.0.get(name).map(|values| values.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.values(name).is_empty()
    }

    /// At most one value
    pub fn single(&self, name: &str) -> Result<Option<&str>, ConfigurationError> {
        match self.values(name) {
            [] => Ok(None),
            [value] => Ok(Some(value.as_str())),
            values => Err(ConfigurationError::invalid(
                name,
                format!("expected a single value, got {}", values.len()),
            )),
        }
    }

    /// Exactly one non-blank value
    pub fn required(&self, name: &str) -> Result<&str, ConfigurationError> {
        match self.single(name)? {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigurationError::MissingParameter(name.to_string())),
        }
    }

    /// Boolean flag, `true`/`false` in any case
    pub fn flag(&self, name: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.single(name)? {
            None => Ok(default),
            Some(value) => match value.trim().to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ConfigurationError::invalid(
                    name,
                    format!("expected 'true' or 'false', got '{}'", value),
                )),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for SourceConfig {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut config = SourceConfig::new();
        for (name, value) in iter {
            config.push(name, value);
        }
        config
    }
}

impl From<BTreeMap<String, Vec<String>>> for SourceConfig {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

/// Description of one parameter a source accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    pub mandatory: bool,
    pub description: String,
}

impl ParameterDefinition {
    pub fn mandatory(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mandatory: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mandatory: false,
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_keys_accumulate() {
        let config = SourceConfig::new()
            .with("exclude", "*.tmp")
            .with("exclude", "*.bak")
            .with("source-directory", "/data/docs");

        assert_eq!(config.values("exclude"), ["*.tmp", "*.bak"]);
        assert_eq!(config.required("source-directory").unwrap(), "/data/docs");
        assert!(config.values("missing").is_empty());
    }

    #[test]
    fn test_required_rejects_missing_blank_and_repeated() {
        let config = SourceConfig::new()
            .with("blank", "  ")
            .with("twice", "a")
            .with("twice", "b");

        assert_eq!(
            config.required("absent"),
            Err(ConfigurationError::MissingParameter("absent".to_string()))
        );
        assert_eq!(
            config.required("blank"),
            Err(ConfigurationError::MissingParameter("blank".to_string()))
        );
        assert!(matches!(
            config.required("twice"),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_flags() {
        let config = SourceConfig::new()
            .with("include-hidden", "TRUE")
            .with("dry", "maybe");

        assert!(config.flag("include-hidden", false).unwrap());
        assert!(!config.flag("absent", false).unwrap());
        assert!(config.flag("dry", false).is_err());
    }

    #[test]
    fn test_deserializes_from_json_lists() {
        let config: SourceConfig =
            serde_json::from_str(r#"{"source-directory": ["/data"], "tag": ["a", "b"]}"#).unwrap();
        assert_eq!(config.values("tag").len(), 2);

        let mut merged = config.clone();
        merged.extend(SourceConfig::new().with("tag", "c"));
        assert_eq!(merged.values("tag"), ["a", "b", "c"]);
    }
}
