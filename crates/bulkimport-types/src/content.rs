//! Content delivery contracts
//!
//! A [`ContentUnit`] describes the bytes of one item version and knows how to
//! stream them. The repository hands it a [`ContentSink`] when it is ready to
//! accept the bytes; the unit declares MIME type, encoding and locale on that
//! sink itself. Nothing in the import engine guesses these values.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::WriteError;

/// Destination of a content delivery
pub trait ContentSink: Send {
    fn set_mimetype(&mut self, mimetype: &str);

    fn set_encoding(&mut self, encoding: &str);

    fn set_locale(&mut self, locale: &str);

    /// Byte stream the content is written to
    fn writer(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin);
}

/// Deferred content of a single item version
#[async_trait]
pub trait ContentUnit: Send + Sync {
    /// Where the bytes come from, for error messages
    fn origin(&self) -> Option<&str>;

    /// Payload length, used only for progress accounting
    fn size_bytes(&self) -> u64;

    /// Whether there is anything to deliver at all
    fn has_content(&self) -> bool {
        true
    }

    /// Stream the content into `sink`, returning the number of bytes written.
    ///
    /// Must not be called when [`has_content`](Self::has_content) is false.
    /// May be called again after a failed attempt.
    async fn deliver(&self, sink: &mut dyn ContentSink) -> Result<u64, WriteError>;
}

/// Content held in memory
#[derive(Debug, Clone)]
pub struct MemoryContent {
    origin: String,
    bytes: Vec<u8>,
    mimetype: Option<String>,
    encoding: Option<String>,
    locale: Option<String>,
}

impl MemoryContent {
    pub fn new(origin: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            origin: origin.into(),
            bytes: bytes.into(),
            mimetype: None,
            encoding: None,
            locale: None,
        }
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

#[async_trait]
impl ContentUnit for MemoryContent {
    fn origin(&self) -> Option<&str> {
        Some(&self.origin)
    }

    fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    async fn deliver(&self, sink: &mut dyn ContentSink) -> Result<u64, WriteError> {
        if let Some(mimetype) = &self.mimetype {
            sink.set_mimetype(mimetype);
        }
        if let Some(encoding) = &self.encoding {
            sink.set_encoding(encoding);
        }
        if let Some(locale) = &self.locale {
            sink.set_locale(locale);
        }

        let writer = sink.writer();
        writer
            .write_all(&self.bytes)
            .await
            .map_err(|e| WriteError::from_io(&e, &self.origin))?;
        writer
            .flush()
            .await
            .map_err(|e| WriteError::from_io(&e, &self.origin))?;

        Ok(self.bytes.len() as u64)
    }
}

/// Sink collecting delivered content in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub bytes: Vec<u8>,
    pub mimetype: Option<String>,
    pub encoding: Option<String>,
    pub locale: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentSink for MemorySink {
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
        &mut self.bytes
    }
}
