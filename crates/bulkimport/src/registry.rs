//! Name-keyed registry of import sources

use bulkimport_fs::FilesystemImportSource;
use bulkimport_types::{ImportError, ImportResult, ImportSource};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

type SourceFactory = Box<dyn Fn() -> Arc<dyn ImportSource> + Send + Sync>;

/// Sources available to the orchestrator, filled once at process start
///
/// Resolution only reads the map, so a registry shared behind an `Arc` needs
/// no locking.
#[derive(Default)]
pub struct SourceRegistry {
    factories: HashMap<String, SourceFactory>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in filesystem source
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(FilesystemImportSource::NAME, || {
            Arc::new(FilesystemImportSource::new())
        });
        registry
    }

    /// Register a source factory, replacing any source of the same name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn ImportSource> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            warn!("Replacing already registered import source: {}", name);
        } else {
            info!("Registering import source: {}", name);
        }
        self.factories.insert(name, Box::new(factory));
    }

    /// Look up a source by name
    pub fn resolve(&self, name: &str) -> ImportResult<Arc<dyn ImportSource>> {
        let name = name.trim();
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ImportError::UnknownSource(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// One instance of every registered source, sorted by name
    pub fn sources(&self) -> Vec<Arc<dyn ImportSource>> {
        self.names()
            .into_iter()
            .filter_map(|name| self.factories.get(name).map(|factory| factory()))
            .collect()
    }
}
