//! Bulk import engine
//!
//! Pulls items lazily from a named [`ImportSource`](bulkimport_types::ImportSource)
//! and writes them through a [`RepositoryWriter`](bulkimport_types::RepositoryWriter).
//!
//! # Architecture
//!
//! - **Registry**: name-keyed import sources, filled at process start
//! - **Services**: the orchestrator, run handles and write ordering
//! - **Action**: the `bulk-import` trigger, decoding string parameters
//!
//! # Ordering
//!
//! Parent folders are written before their children, and versions of one
//! identity are written one at a time in ascending order. Unrelated items are
//! written in parallel up to the configured limit.

pub mod action;
pub mod registry;
pub mod services;
pub mod settings;

pub use action::{BulkImportAction, ImportRequest};
pub use registry::SourceRegistry;
pub use services::{ImportOrchestrator, ImportRun};
pub use settings::OrchestratorSettings;
