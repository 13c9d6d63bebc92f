//! Repository-write port
//!
//! The only boundary through which imported items reach the repository. The
//! engine depends on this contract, never on a concrete repository API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    content::ContentUnit,
    error::WriteError,
    item::{ImportItem, ItemKind, Properties, Version},
};

/// Reference to the container items are imported into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetContainer(pub String);

impl TargetContainer {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node write
pub struct WriteRequest<'a> {
    pub target: &'a TargetContainer,
    pub target_path: &'a str,
    pub kind: ItemKind,
    pub version: Version,
    pub properties: &'a Properties,
    /// Content-delivery callback: the writer calls `deliver` with its own sink
    pub content: Option<&'a dyn ContentUnit>,
}

impl<'a> WriteRequest<'a> {
    pub fn for_item(target: &'a TargetContainer, item: &'a ImportItem) -> Self {
        Self {
            target,
            target_path: &item.target_path,
            kind: item.kind,
            version: item.version,
            properties: &item.properties,
            content: item.deliverable_content(),
        }
    }
}

impl fmt::Debug for WriteRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteRequest")
            .field("target", &self.target)
            .field("target_path", &self.target_path)
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("properties", &self.properties)
            .field("content", &self.content.and_then(|content| content.origin()))
            .finish()
    }
}

/// Persists items into the target content store
///
/// Implementations classify every failure as transient (the engine retries)
/// or permanent (the engine records it and moves on). Timeouts, if any, are
/// the implementation's concern and surface through the same classification.
#[async_trait]
pub trait RepositoryWriter: Send + Sync {
    async fn write(&self, request: WriteRequest<'_>) -> Result<(), WriteError>;
}
