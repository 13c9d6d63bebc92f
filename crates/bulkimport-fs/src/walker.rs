//! Lazy directory walker
//!
//! Reads one directory listing at a time. A listing is sorted by logical name
//! and version, emitted in that order, and its subdirectories are expanded only
//! after their folder items have been emitted, so parents always precede their
//! children and versions of one document arrive in ascending order.

use async_trait::async_trait;
use bulkimport_types::{
    EnumerationError, ImportItem, ItemStream, Properties, StreamEntry, Version,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use tracing::debug;

use crate::content::FilesystemContent;
use crate::metadata::{read_sidecar, sidecar_subject};
use crate::source::WalkSettings;

struct PendingDirectory {
    path: PathBuf,
    target_path: String,
    /// Target path of a failed ancestor folder
    blocked_by: Option<String>,
}

enum Payload {
    Folder(PathBuf),
    File { path: PathBuf, size_bytes: u64 },
    MetadataOnly,
}

struct Candidate {
    logical: String,
    version: Version,
    target_path: String,
    payload: Payload,
    sidecar: Option<PathBuf>,
    /// Path reported when this entry fails
    reference: String,
    blocked_by: Option<String>,
}

enum Pending {
    Entry(Candidate),
    Failed(EnumerationError),
}

/// Item stream over a directory tree
pub struct FilesystemItemStream {
    settings: WalkSettings,
    queue: VecDeque<Pending>,
    /// Folders emitted from the current listing, not yet scheduled
    discovered: Vec<PendingDirectory>,
    /// Directories waiting to be listed, depth-first
    directories: Vec<PendingDirectory>,
    exhausted: bool,
}

impl FilesystemItemStream {
    pub(crate) fn new(settings: WalkSettings) -> Self {
        let root = PendingDirectory {
            path: settings.root.clone(),
            target_path: String::new(),
            blocked_by: None,
        };

        Self {
            settings,
            queue: VecDeque::new(),
            discovered: Vec::new(),
            directories: vec![root],
            exhausted: false,
        }
    }

    async fn list_directory(&mut self, directory: PendingDirectory) {
        debug!("Listing {}", directory.path.display());

        let mut reader = match tokio::fs::read_dir(&directory.path).await {
            Ok(reader) => reader,
            Err(e) => {
                self.fail(directory.path.display().to_string(), e.to_string());
                return;
            }
        };

        let mut sidecars: HashMap<String, PathBuf> = HashMap::new();
        let mut entries: Vec<(String, Payload, String)> = Vec::new();
        // Entries left out of the import; their sidecars are ignored too
        let mut skipped: HashSet<String> = HashSet::new();

        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    self.fail(directory.path.display().to_string(), e.to_string());
                    break;
                }
            };

            let path = entry.path();
            let reference = path.display().to_string();
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => {
                    self.fail(reference, "file name is not valid UTF-8");
                    continue;
                }
            };

            if !self.settings.include_hidden && name.starts_with('.') {
                continue;
            }

            if let Some(subject) = sidecar_subject(&name, &self.settings.metadata_suffix) {
                sidecars.insert(subject.to_string(), path);
                continue;
            }

            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    self.fail(reference, e.to_string());
                    skipped.insert(name);
                    continue;
                }
            };

            let is_symlink = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_symlink())
                .unwrap_or(false);

            let payload = if metadata.is_dir() {
                if is_symlink {
                    debug!("Not following directory symlink {}", reference);
                    skipped.insert(name);
                    continue;
                }
                Payload::Folder(path)
            } else if metadata.is_file() {
                Payload::File {
                    path,
                    size_bytes: metadata.len(),
                }
            } else {
                debug!("Skipping special file {}", reference);
                skipped.insert(name);
                continue;
            };

            entries.push((name, payload, reference));
        }

        let names: HashSet<&str> = entries.iter().map(|(name, _, _)| name.as_str()).collect();
        let mut orphans: Vec<(String, PathBuf)> = sidecars
            .iter()
            .filter(|(subject, _)| {
                !names.contains(subject.as_str()) && !skipped.contains(subject.as_str())
            })
            .map(|(subject, path)| (subject.clone(), path.clone()))
            .collect();
        orphans.sort();

        let mut candidates = Vec::with_capacity(entries.len() + orphans.len());
        for (name, payload, reference) in entries {
            let sidecar = sidecars.get(&name).cloned();
            let (logical, version) = match payload {
                Payload::Folder(_) => (name, Version::INITIAL),
                _ => {
                    let parsed = self.settings.scheme.parse_name(&name);
                    (parsed.logical, parsed.version)
                }
            };
            candidates.push(Candidate {
                target_path: join(&directory.target_path, &logical),
                logical,
                version,
                payload,
                sidecar,
                reference,
                blocked_by: directory.blocked_by.clone(),
            });
        }

        for (subject, sidecar) in orphans {
            let parsed = self.settings.scheme.parse_name(&subject);
            candidates.push(Candidate {
                target_path: join(&directory.target_path, &parsed.logical),
                logical: parsed.logical,
                version: parsed.version,
                payload: Payload::MetadataOnly,
                reference: sidecar.display().to_string(),
                sidecar: Some(sidecar),
                blocked_by: directory.blocked_by.clone(),
            });
        }

        candidates.sort_by(|a, b| {
            (a.logical.as_str(), a.version).cmp(&(b.logical.as_str(), b.version))
        });

        let mut previous: Option<(String, Version)> = None;
        for candidate in candidates {
            let key = (candidate.logical.clone(), candidate.version);
            if previous.as_ref() == Some(&key) {
                self.fail(
                    candidate.reference,
                    format!(
                        "duplicate version {} of '{}'",
                        candidate.version, candidate.target_path
                    ),
                );
                continue;
            }
            previous = Some(key);
            self.queue.push_back(Pending::Entry(candidate));
        }
    }

    async fn materialize(&mut self, candidate: Candidate) -> StreamEntry {
        if let Some(ancestor) = &candidate.blocked_by {
            if let Payload::Folder(path) = &candidate.payload {
                self.discovered.push(PendingDirectory {
                    path: path.clone(),
                    target_path: candidate.target_path.clone(),
                    blocked_by: Some(ancestor.clone()),
                });
            }
            return Err(EnumerationError::new(
                candidate.reference,
                format!("parent folder '{}' failed to enumerate", ancestor),
            ));
        }

        let properties = match &candidate.sidecar {
            Some(sidecar) => read_sidecar(sidecar)
                .await
                .map_err(|e| EnumerationError::new(sidecar.display().to_string(), e.to_string())),
            None => Ok(Properties::new()),
        };

        // Contents of a failed folder are still walked, and reported as failures
        if let Payload::Folder(path) = &candidate.payload {
            self.discovered.push(PendingDirectory {
                path: path.clone(),
                target_path: candidate.target_path.clone(),
                blocked_by: properties.is_err().then(|| candidate.target_path.clone()),
            });
        }
        let properties = properties?;

        let item = match candidate.payload {
            Payload::Folder(_) => ImportItem::folder(candidate.target_path),
            Payload::File { path, size_bytes } => {
                ImportItem::document(candidate.target_path, candidate.version)
                    .with_content(Box::new(FilesystemContent::new(path, size_bytes)))
            }
            Payload::MetadataOnly => ImportItem::document(candidate.target_path, candidate.version),
        };

        Ok(item.with_properties(properties))
    }

    fn fail(&mut self, reference: impl Into<String>, message: impl Into<String>) {
        self.queue
            .push_back(Pending::Failed(EnumerationError::new(reference, message)));
    }
}

#[async_trait]
impl ItemStream for FilesystemItemStream {
    async fn next_item(&mut self) -> Option<StreamEntry> {
        loop {
            if self.exhausted {
                return None;
            }

            if let Some(pending) = self.queue.pop_front() {
                return Some(match pending {
                    Pending::Failed(error) => Err(error),
                    Pending::Entry(candidate) => self.materialize(candidate).await,
                });
            }

            let discovered = std::mem::take(&mut self.discovered);
            self.directories.extend(discovered.into_iter().rev());

            match self.directories.pop() {
                Some(directory) => self.list_directory(directory).await,
                None => self.exhausted = true,
            }
        }
    }

    async fn close(&mut self) {
        self.queue.clear();
        self.discovered.clear();
        self.directories.clear();
        self.exhausted = true;
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}
