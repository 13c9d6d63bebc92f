//! File-backed content unit

use async_trait::async_trait;
use bulkimport_types::{ContentSink, ContentUnit, WriteError};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Bytes inspected to decide the declared encoding
const SNIFF_LEN: usize = 8 * 1024;

/// Content of a single file on disk
#[derive(Debug, Clone)]
pub struct FilesystemContent {
    path: PathBuf,
    origin: String,
    size_bytes: u64,
}

impl FilesystemContent {
    pub fn new(path: PathBuf, size_bytes: u64) -> Self {
        let origin = path.display().to_string();
        Self {
            path,
            origin,
            size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ContentUnit for FilesystemContent {
    fn origin(&self) -> Option<&str> {
        Some(&self.origin)
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    async fn deliver(&self, sink: &mut dyn ContentSink) -> Result<u64, WriteError> {
        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| WriteError::from_io(&e, &self.origin))?;

        let mime = mime_guess::from_path(&self.path).first_or_octet_stream();
        sink.set_mimetype(mime.essence_str());

        let mut head = vec![0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < head.len() {
            let read = file
                .read(&mut head[filled..])
                .await
                .map_err(|e| WriteError::from_io(&e, &self.origin))?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        head.truncate(filled);

        if mime.type_() == mime_guess::mime::TEXT && is_utf8_prefix(&head) {
            sink.set_encoding("UTF-8");
        }

        let writer = sink.writer();
        writer
            .write_all(&head)
            .await
            .map_err(|e| WriteError::from_io(&e, &self.origin))?;
        let copied = tokio::io::copy(&mut file, &mut *writer)
            .await
            .map_err(|e| WriteError::from_io(&e, &self.origin))?;
        writer
            .flush()
            .await
            .map_err(|e| WriteError::from_io(&e, &self.origin))?;

        let total = head.len() as u64 + copied;
        debug!("Delivered {} bytes from {}", total, self.origin);
        Ok(total)
    }
}

/// Valid UTF-8, allowing a multi-byte sequence cut off at the end
fn is_utf8_prefix(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkimport_types::MemorySink;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_deliver_streams_file_and_declares_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, "héllo wörld").unwrap();

        let content = FilesystemContent::new(path.clone(), 13);
        let mut sink = MemorySink::new();
        let written = content.deliver(&mut sink).await.unwrap();

        assert_eq!(written, 13);
        assert_eq!(sink.bytes, "héllo wörld".as_bytes());
        assert_eq!(sink.mimetype.as_deref(), Some("text/plain"));
        assert_eq!(sink.encoding.as_deref(), Some("UTF-8"));
        assert!(sink.locale.is_none());
        assert_eq!(content.origin(), Some(path.display().to_string().as_str()));
    }

    #[tokio::test]
    async fn test_binary_content_has_no_encoding() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blob.bin");
        let bytes: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &bytes).unwrap();

        let content = FilesystemContent::new(path, bytes.len() as u64);
        let mut sink = MemorySink::new();
        let written = content.deliver(&mut sink).await.unwrap();

        assert_eq!(written, 20_000);
        assert_eq!(sink.bytes, bytes);
        assert_eq!(sink.mimetype.as_deref(), Some("application/octet-stream"));
        assert!(sink.encoding.is_none());
    }

    #[tokio::test]
    async fn test_vanished_file_is_permanent_failure() {
        let temp_dir = TempDir::new().unwrap();
        let content = FilesystemContent::new(temp_dir.path().join("gone.txt"), 3);
        let mut sink = MemorySink::new();

        let err = content.deliver(&mut sink).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message().contains("gone.txt"));
    }

    #[test]
    fn test_utf8_prefix() {
        assert!(is_utf8_prefix("abc".as_bytes()));
        let euro = "€".as_bytes();
        assert!(is_utf8_prefix(&euro[..2]));
        assert!(!is_utf8_prefix(&[0xff, 0x00]));
    }
}
