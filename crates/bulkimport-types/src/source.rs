//! Import source contract
//!
//! Defines the interface every source (filesystem, archive, object store, ...)
//! implements. A source validates its configuration eagerly in
//! [`ImportSource::open`] and hands back a lazy, single-pass [`ItemStream`].

use async_trait::async_trait;

use crate::{
    config::{ParameterDefinition, SourceConfig},
    error::{ConfigurationError, EnumerationError},
    item::ImportItem,
};

/// Outcome of advancing a stream by one step
pub type StreamEntry = Result<ImportItem, EnumerationError>;

/// Lazy, single-pass sequence of import items
///
/// `next_item` returns `None` once the stream is exhausted and keeps returning
/// `None` afterwards. An `Err` entry reports one item that could not be
/// enumerated; the stream continues with the next one. Streams are not
/// restartable: re-open the source instead.
#[async_trait]
pub trait ItemStream: Send {
    async fn next_item(&mut self) -> Option<StreamEntry>;

    /// Release directory handles, descriptors and similar resources.
    ///
    /// Called exactly once by the orchestrator on every exit path, including
    /// cancellation. After `close` the stream behaves as exhausted.
    async fn close(&mut self) {}
}

/// Source of import items
#[async_trait]
pub trait ImportSource: Send + Sync {
    /// Registry identifier
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Parameters accepted by [`open`](Self::open)
    fn parameters(&self) -> Vec<ParameterDefinition> {
        Vec::new()
    }

    /// Validate `config` and start a new enumeration.
    ///
    /// Every configuration problem must surface here, never mid-stream.
    async fn open(&self, config: &SourceConfig) -> Result<Box<dyn ItemStream>, ConfigurationError>;
}

/// Item stream backed by an in-memory iterator
pub struct IterItemStream<I> {
    entries: Option<I>,
}

impl<I> IterItemStream<I>
where
    I: Iterator<Item = StreamEntry> + Send,
{
    pub fn new(entries: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            entries: Some(entries.into_iter()),
        }
    }
}

#[async_trait]
impl<I> ItemStream for IterItemStream<I>
where
    I: Iterator<Item = StreamEntry> + Send,
{
    async fn next_item(&mut self) -> Option<StreamEntry> {
        let next = self.entries.as_mut().and_then(|entries| entries.next());
        if next.is_none() {
            self.entries = None;
        }
        next
    }

    async fn close(&mut self) {
        self.entries = None;
    }
}
