//! Import item types
//!
//! An [`ImportItem`] is one unit of work produced by a source: a folder or a
//! single version of a document, together with its properties and, when it
//! carries bytes, the content unit that delivers them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::content::ContentUnit;

/// Revision ordinal of an item within its logical identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// Version implied when a source finds no version marker
    pub const INITIAL: Version = Version(1);

    pub fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of repository node an item becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Container node; its children are emitted after it
    Folder,
    /// Content node, possibly versioned
    Document,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Folder => write!(f, "folder"),
            ItemKind::Document => write!(f, "document"),
        }
    }
}

/// Multi-valued metadata attached to an item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, Vec<String>>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values of a property with a single value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), vec![value.into()]);
    }

    /// Append a value to a (possibly multi-valued) property
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(|values| values.as_slice())
    }

    /// First value of a property
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(|value| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A single item to import
///
/// The logical identity of an item is its `target_path`: all versions of the
/// same document share it. Sources guarantee that `(target_path, version)` is
/// unique within one stream.
pub struct ImportItem {
    /// `/`-separated path relative to the target container
    pub target_path: String,
    pub kind: ItemKind,
    pub version: Version,
    pub properties: Properties,
    /// Absent for folders and metadata-only documents
    pub content: Option<Box<dyn ContentUnit>>,
}

impl ImportItem {
    pub fn folder(target_path: impl Into<String>) -> Self {
        Self {
            target_path: normalize_path(&target_path.into()),
            kind: ItemKind::Folder,
            version: Version::INITIAL,
            properties: Properties::new(),
            content: None,
        }
    }

    pub fn document(target_path: impl Into<String>, version: Version) -> Self {
        Self {
            target_path: normalize_path(&target_path.into()),
            kind: ItemKind::Document,
            version,
            properties: Properties::new(),
            content: None,
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_content(mut self, content: Box<dyn ContentUnit>) -> Self {
        self.content = Some(content);
        self
    }

    /// Logical identity shared by every version of this item
    pub fn identity(&self) -> &str {
        &self.target_path
    }

    /// Target path of the parent folder, `None` for direct children of the target
    pub fn parent(&self) -> Option<&str> {
        self.target_path
            .rfind('/')
            .map(|index| &self.target_path[..index])
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        match self.target_path.rfind('/') {
            Some(index) => &self.target_path[index + 1..],
            None => &self.target_path,
        }
    }

    /// Content unit, if it actually carries bytes
    pub fn deliverable_content(&self) -> Option<&dyn ContentUnit> {
        self.content
            .as_deref()
            .filter(|content| content.has_content())
    }

    /// Byte size used for progress accounting
    pub fn size_bytes(&self) -> u64 {
        self.deliverable_content()
            .map(|content| content.size_bytes())
            .unwrap_or(0)
    }

    /// Human-readable reference used in failure reports
    pub fn reference(&self) -> String {
        match self.version {
            Version::INITIAL => self.target_path.clone(),
            version => format!("{} (version {})", self.target_path, version),
        }
    }
}

impl fmt::Debug for ImportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportItem")
            .field("target_path", &self.target_path)
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("properties", &self.properties)
            .field(
                "content",
                &self.content.as_ref().map(|content| content.origin()),
            )
            .finish()
    }
}

fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
