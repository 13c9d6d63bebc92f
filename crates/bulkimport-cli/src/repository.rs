//! Local-directory repository
//!
//! Writes imported items into a directory tree: folders become directories,
//! documents become files, and each node's metadata is stored next to it in
//! `<name>.properties.json`. A new version of a document replaces the bytes of
//! the previous one.

use async_trait::async_trait;
use bulkimport_types::{
    ContentSink, ItemKind, Properties, RepositoryWriter, Version, WriteError, WriteRequest,
};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

/// Suffix of the metadata file stored next to each node
pub const PROPERTIES_SUFFIX: &str = ".properties.json";

/// Suffix of a document being written, renamed into place once complete
const PARTIAL_SUFFIX: &str = ".part";

#[derive(Serialize)]
struct StoredProperties<'a> {
    kind: ItemKind,
    version: Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    mimetype: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locale: Option<&'a str>,
    properties: &'a Properties,
}

/// Content sink streaming into a file
struct FileSink {
    file: BufWriter<File>,
    mimetype: Option<String>,
    encoding: Option<String>,
    locale: Option<String>,
}

impl FileSink {
    async fn create(path: &Path) -> Result<Self, WriteError> {
        let file = File::create(path)
            .await
            .map_err(|e| WriteError::from_io(&e, path.display()))?;
        Ok(Self {
            file: BufWriter::new(file),
            mimetype: None,
            encoding: None,
            locale: None,
        })
    }

    async fn finish(&mut self, path: &Path) -> Result<(), WriteError> {
        self.file
            .flush()
            .await
            .map_err(|e| WriteError::from_io(&e, path.display()))?;
        self.file
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| WriteError::from_io(&e, path.display()))
    }
}

impl ContentSink for FileSink {
    fn set_mimetype(&mut self, mimetype: &str) {
        self.mimetype = Some(mimetype.to_string());
    }

    fn set_encoding(&mut self, encoding: &str) {
        self.encoding = Some(encoding.to_string());
    }

    fn set_locale(&mut self, locale: &str) {
        self.locale = Some(locale.to_string());
    }

    fn writer(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin) {
        &mut self.file
    }
}

/// Repository writer backed by a local directory
///
/// The target container reference is the path of an existing directory.
#[derive(Debug, Default, Clone)]
pub struct LocalDirectoryWriter;

impl LocalDirectoryWriter {
    pub fn new() -> Self {
        Self
    }

    async fn container_root(reference: &str) -> Result<PathBuf, WriteError> {
        let root = PathBuf::from(reference);
        match tokio::fs::metadata(&root).await {
            Ok(metadata) if metadata.is_dir() => Ok(root),
            Ok(_) => Err(WriteError::permanent(format!(
                "target container {} is not a directory",
                reference
            ))),
            Err(e) => Err(WriteError::permanent(format!(
                "target container {}: {}",
                reference, e
            ))),
        }
    }

    async fn write_folder(path: &Path) -> Result<(), WriteError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| WriteError::from_io(&e, path.display()))
    }

    /// Stream the document's content, returning the declared format
    async fn write_document(
        path: &Path,
        request: &WriteRequest<'_>,
    ) -> Result<Option<FileSink>, WriteError> {
        if let Some(parent) = path.parent() {
            Self::write_folder(parent).await?;
        }

        let Some(content) = request.content else {
            // Metadata-only version: keep the bytes of earlier versions
            if tokio::fs::metadata(path).await.is_err() {
                File::create(path)
                    .await
                    .map_err(|e| WriteError::from_io(&e, path.display()))?;
            }
            return Ok(None);
        };

        let partial = sibling(path, PARTIAL_SUFFIX);
        let mut sink = FileSink::create(&partial).await?;
        let delivered = match content.deliver(&mut sink).await {
            Ok(delivered) => delivered,
            Err(e) => {
                drop(sink);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        sink.finish(&partial).await?;
        tokio::fs::rename(&partial, path)
            .await
            .map_err(|e| WriteError::from_io(&e, path.display()))?;

        debug!("Stored {} bytes at {}", delivered, path.display());
        Ok(Some(sink))
    }

    async fn write_properties(
        path: &Path,
        request: &WriteRequest<'_>,
        sink: Option<&FileSink>,
    ) -> Result<(), WriteError> {
        let stored = StoredProperties {
            kind: request.kind,
            version: request.version,
            mimetype: sink.and_then(|sink| sink.mimetype.as_deref()),
            encoding: sink.and_then(|sink| sink.encoding.as_deref()),
            locale: sink.and_then(|sink| sink.locale.as_deref()),
            properties: request.properties,
        };
        let json = serde_json::to_vec_pretty(&stored)
            .map_err(|e| WriteError::permanent(format!("{}: {}", path.display(), e)))?;

        let properties_path = sibling(path, PROPERTIES_SUFFIX);
        tokio::fs::write(&properties_path, json)
            .await
            .map_err(|e| WriteError::from_io(&e, properties_path.display()))
    }
}

#[async_trait]
impl RepositoryWriter for LocalDirectoryWriter {
    async fn write(&self, request: WriteRequest<'_>) -> Result<(), WriteError> {
        let root = Self::container_root(request.target.as_str()).await?;
        let path = root.join(relative_path(request.target_path)?);

        match request.kind {
            ItemKind::Folder => {
                Self::write_folder(&path).await?;
                if !request.properties.is_empty() {
                    Self::write_properties(&path, &request, None).await?;
                }
            }
            ItemKind::Document => {
                let sink = Self::write_document(&path, &request).await?;
                Self::write_properties(&path, &request, sink.as_ref()).await?;
            }
        }

        Ok(())
    }
}

/// Target path as a relative path that cannot leave the container
fn relative_path(target_path: &str) -> Result<PathBuf, WriteError> {
    let path = PathBuf::from(target_path);
    let escapes = path
        .components()
        .any(|component| !matches!(component, Component::Normal(_)));
    if target_path.is_empty() || escapes {
        return Err(WriteError::permanent(format!(
            "invalid target path '{}'",
            target_path
        )));
    }
    Ok(path)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
