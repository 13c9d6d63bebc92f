//! `bulk-import` trigger action
//!
//! Decodes the action's string parameters into an [`ImportRequest`] and starts
//! the run on the orchestrator.

use bulkimport_fs::FilesystemImportSource;
use bulkimport_types::{ConfigurationError, SourceConfig, TargetContainer};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

use crate::services::{ImportOrchestrator, ImportRun};

/// Name of the source to import from (blank or absent: filesystem)
pub const PARAM_IMPORT_SOURCE_NAME: &str = "import-source-name";
/// JSON object of source parameters
pub const PARAM_PARAMETERS: &str = "parameters";
/// Target container reference
pub const PARAM_TARGET: &str = "target";

/// Source used when the action names none
pub const DEFAULT_SOURCE_NAME: &str = FilesystemImportSource::NAME;

#[derive(Deserialize)]
#[serde(untagged)]
enum ParameterValues {
    One(String),
    Many(Vec<String>),
}

/// Decode a JSON object mapping parameter names to a string or a list of strings
pub fn decode_parameters(json: &str) -> Result<SourceConfig, ConfigurationError> {
    let decoded: BTreeMap<String, ParameterValues> = serde_json::from_str(json)
        .map_err(|e| ConfigurationError::InvalidParameters(e.to_string()))?;

    let parameters = decoded
        .into_iter()
        .map(|(name, values)| {
            let values = match values {
                ParameterValues::One(value) => vec![value],
                ParameterValues::Many(values) => values,
            };
            (name, values)
        })
        .collect::<BTreeMap<_, _>>();

    Ok(SourceConfig::from(parameters))
}

/// Fully decoded import request
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub source: String,
    pub parameters: SourceConfig,
    pub target: TargetContainer,
}

impl ImportRequest {
    /// Decode the action's parameters
    pub fn from_action_parameters(
        parameters: &HashMap<String, String>,
    ) -> Result<Self, ConfigurationError> {
        let source = parameters
            .get(PARAM_IMPORT_SOURCE_NAME)
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SOURCE_NAME)
            .to_string();

        let encoded = required(parameters, PARAM_PARAMETERS)?;
        let target = required(parameters, PARAM_TARGET)?;

        Ok(Self {
            source,
            parameters: decode_parameters(encoded)?,
            target: TargetContainer::new(target),
        })
    }
}

fn required<'a>(
    parameters: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, ConfigurationError> {
    parameters
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigurationError::MissingParameter(name.to_string()))
}

/// The `bulk-import` action
pub struct BulkImportAction {
    orchestrator: Arc<ImportOrchestrator>,
}

impl BulkImportAction {
    pub const NAME: &'static str = "bulk-import";

    pub fn new(orchestrator: Arc<ImportOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Decode the parameters and start the run
    ///
    /// Malformed parameters fail here, before any run exists.
    pub fn execute(
        &self,
        parameters: &HashMap<String, String>,
    ) -> Result<ImportRun, ConfigurationError> {
        let request = ImportRequest::from_action_parameters(parameters)?;
        Ok(self.execute_request(request))
    }

    pub fn execute_request(&self, request: ImportRequest) -> ImportRun {
        let run = self
            .orchestrator
            .start(&request.source, request.parameters, request.target);
        info!(
            "Action {} started import run {} from source '{}'",
            Self::NAME,
            run.id(),
            run.source()
        );
        run
    }
}
