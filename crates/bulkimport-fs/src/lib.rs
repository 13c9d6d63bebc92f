//! Filesystem import source
//!
//! Reference [`ImportSource`](bulkimport_types::ImportSource) implementation:
//! walks a directory tree and emits one item per folder and file version.
//!
//! # On-disk conventions
//!
//! - Directories become folder items, emitted before their contents.
//! - Version markers in file names follow the configured [`VersionScheme`].
//! - Sidecar files (`<entry><metadata-suffix>`) carry item properties.

pub mod content;
pub mod metadata;
pub mod naming;
pub mod source;
mod walker;

pub use content::FilesystemContent;
pub use metadata::{DEFAULT_METADATA_SUFFIX, PARAM_METADATA_SUFFIX};
pub use naming::{VersionScheme, VersionedName, PARAM_VERSION_SCHEME};
pub use source::{FilesystemImportSource, PARAM_INCLUDE_HIDDEN, PARAM_SOURCE_DIRECTORY};
pub use walker::FilesystemItemStream;
