//! Filesystem import source

use async_trait::async_trait;
use bulkimport_types::{
    ConfigurationError, ImportSource, ItemStream, ParameterDefinition, SourceConfig,
};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::metadata::{DEFAULT_METADATA_SUFFIX, PARAM_METADATA_SUFFIX};
use crate::naming::{VersionScheme, PARAM_VERSION_SCHEME};
use crate::walker::FilesystemItemStream;

/// Root directory to import (mandatory)
pub const PARAM_SOURCE_DIRECTORY: &str = "source-directory";
/// Import entries whose name starts with a dot
pub const PARAM_INCLUDE_HIDDEN: &str = "include-hidden";

const KNOWN_PARAMETERS: [&str; 4] = [
    PARAM_SOURCE_DIRECTORY,
    PARAM_VERSION_SCHEME,
    PARAM_METADATA_SUFFIX,
    PARAM_INCLUDE_HIDDEN,
];

/// Validated walk configuration
#[derive(Debug, Clone)]
pub(crate) struct WalkSettings {
    pub root: PathBuf,
    pub scheme: VersionScheme,
    pub metadata_suffix: String,
    pub include_hidden: bool,
}

impl WalkSettings {
    async fn from_config(config: &SourceConfig) -> Result<Self, ConfigurationError> {
        for (name, _) in config.iter() {
            if !KNOWN_PARAMETERS.contains(&name.as_str()) {
                debug!("Ignoring unknown filesystem source parameter '{}'", name);
            }
        }

        let directory = config.required(PARAM_SOURCE_DIRECTORY)?;
        let scheme = match config.single(PARAM_VERSION_SCHEME)? {
            Some(value) => value.parse()?,
            None => VersionScheme::default(),
        };
        let metadata_suffix = config
            .single(PARAM_METADATA_SUFFIX)?
            .unwrap_or(DEFAULT_METADATA_SUFFIX)
            .to_string();
        if metadata_suffix.is_empty() || metadata_suffix.contains('/') {
            return Err(ConfigurationError::invalid(
                PARAM_METADATA_SUFFIX,
                "must be non-empty and must not contain '/'",
            ));
        }
        let include_hidden = config.flag(PARAM_INCLUDE_HIDDEN, false)?;

        let root = tokio::fs::canonicalize(directory).await.map_err(|e| {
            ConfigurationError::invalid(PARAM_SOURCE_DIRECTORY, format!("{}: {}", directory, e))
        })?;
        let metadata = tokio::fs::metadata(&root).await.map_err(|e| {
            ConfigurationError::invalid(PARAM_SOURCE_DIRECTORY, format!("{}: {}", directory, e))
        })?;
        if !metadata.is_dir() {
            return Err(ConfigurationError::invalid(
                PARAM_SOURCE_DIRECTORY,
                format!("{} is not a directory", directory),
            ));
        }
        // Unreadable roots must fail here rather than as the first enumeration error
        let _listing = tokio::fs::read_dir(&root).await.map_err(|e| {
            ConfigurationError::invalid(
                PARAM_SOURCE_DIRECTORY,
                format!("{} is not readable: {}", directory, e),
            )
        })?;

        Ok(Self {
            root,
            scheme,
            metadata_suffix,
            include_hidden,
        })
    }
}

/// Import source walking a local directory tree
pub struct FilesystemImportSource {
    version: String,
}

impl FilesystemImportSource {
    /// Registry identifier of this source
    pub const NAME: &'static str = "filesystem";

    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Default for FilesystemImportSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImportSource for FilesystemImportSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Imports a local directory tree, with versioned files and sidecar metadata"
    }

    fn parameters(&self) -> Vec<ParameterDefinition> {
        vec![
            ParameterDefinition::mandatory(
                PARAM_SOURCE_DIRECTORY,
                "Directory whose contents are imported",
            ),
            ParameterDefinition::optional(
                PARAM_VERSION_SCHEME,
                "Version marker grammar: 'infix' (report.2.txt, default) \
                 or 'suffix' (report.txt.v2)",
            ),
            ParameterDefinition::optional(
                PARAM_METADATA_SUFFIX,
                format!(
                    "Suffix of sidecar metadata files (default '{}')",
                    DEFAULT_METADATA_SUFFIX
                ),
            ),
            ParameterDefinition::optional(
                PARAM_INCLUDE_HIDDEN,
                "Import entries whose name starts with '.' (true/false, default false)",
            ),
        ]
    }

    async fn open(&self, config: &SourceConfig) -> Result<Box<dyn ItemStream>, ConfigurationError> {
        let settings = WalkSettings::from_config(config).await?;

        info!(
            "Opening filesystem source at {} (version scheme: {}, metadata suffix: {})",
            settings.root.display(),
            settings.scheme,
            settings.metadata_suffix
        );

        Ok(Box::new(FilesystemItemStream::new(settings)))
    }
}
