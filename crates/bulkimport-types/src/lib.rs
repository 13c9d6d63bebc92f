//! Core types and traits for the bulk import system
//!
//! This crate provides the foundational abstractions shared by import sources,
//! the orchestration engine and repository writers.
//!
//! # Architecture
//!
//! - **Sources**: [`ImportSource`] opens a lazy [`ItemStream`] of [`ImportItem`]s
//! - **Content**: [`ContentUnit`] streams an item's bytes into a [`ContentSink`]
//! - **Writes**: [`RepositoryWriter`] is the port into the target repository
//! - **Runs**: status, progress and failure records of one import
//! - **Errors**: the import error taxonomy
//!
//! # Usage
//!
//! Source implementations (e.g., `bulkimport-fs`) depend on this crate and
//! implement the `ImportSource` trait.

pub mod config;
pub mod content;
pub mod error;
pub mod item;
pub mod run;
pub mod source;
pub mod writer;

pub use config::{ParameterDefinition, SourceConfig};
pub use content::{ContentSink, ContentUnit, MemoryContent, MemorySink};
pub use error::{ConfigurationError, EnumerationError, ImportError, ImportResult, WriteError};
pub use item::{ImportItem, ItemKind, Properties, Version};
pub use run::{FailureKind, ImportFailure, ProgressSnapshot, RunStatus, RunSummary};
pub use source::{ImportSource, ItemStream, IterItemStream, StreamEntry};
pub use writer::{RepositoryWriter, TargetContainer, WriteRequest};
