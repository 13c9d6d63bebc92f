//! Bounded look-ahead version ordering

use bulkimport_types::{ImportItem, Version};
use lru::LruCache;
use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Outcome of releasing one buffered item
#[derive(Debug)]
pub enum Release {
    /// Ready for dispatch
    Ready(ImportItem),
    /// A higher version of the same identity was already released
    OutOfOrder { item: ImportItem, latest: Version },
}

/// Holds up to `capacity` items so that versions of one identity that arrive
/// close together leave in ascending order
///
/// Releases follow arrival order of identities: the oldest buffered item
/// picks the identity, and that identity's lowest buffered version goes first.
///
/// Late versions are detected for the `horizon` most recently released
/// identities only; older identities are forgotten.
pub struct VersionSequencer {
    window: VecDeque<ImportItem>,
    capacity: usize,
    released: LruCache<String, Version>,
}

impl VersionSequencer {
    pub fn new(capacity: usize, horizon: usize) -> Self {
        let horizon = NonZeroUsize::new(horizon).unwrap_or(NonZeroUsize::MIN);
        Self {
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
            released: LruCache::new(horizon),
        }
    }

    /// Buffer an item, releasing one once the window is over capacity
    pub fn push(&mut self, item: ImportItem) -> Option<Release> {
        self.window.push_back(item);
        if self.window.len() > self.capacity {
            self.release_next()
        } else {
            None
        }
    }

    /// Release the next item regardless of the window size
    pub fn drain_next(&mut self) -> Option<Release> {
        self.release_next()
    }

    pub fn buffered(&self) -> usize {
        self.window.len()
    }

    /// Identities whose latest released version is still remembered
    pub fn remembered(&self) -> usize {
        self.released.len()
    }

    fn release_next(&mut self) -> Option<Release> {
        let identity = self.window.front()?.identity();
        let index = self
            .window
            .iter()
            .enumerate()
            .filter(|(_, item)| item.identity() == identity)
            .min_by_key(|(index, item)| (item.version, *index))
            .map(|(index, _)| index)?;
        let item = self.window.remove(index)?;

        let latest = self.released.get(item.identity()).copied();
        match latest {
            Some(latest) if item.version < latest => Some(Release::OutOfOrder { item, latest }),
            _ => {
                self.released.put(item.identity().to_string(), item.version);
                Some(Release::Ready(item))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, version: u64) -> ImportItem {
        ImportItem::document(path, Version::new(version))
    }

    fn describe(release: Release) -> String {
        match release {
            Release::Ready(item) => format!("{}@{}", item.identity(), item.version),
            Release::OutOfOrder { item, latest } => {
                format!("late {}@{} after {}", item.identity(), item.version, latest)
            }
        }
    }

    fn run(capacity: usize, items: Vec<ImportItem>) -> Vec<String> {
        let mut sequencer = VersionSequencer::new(capacity, 64);
        let mut out = Vec::new();
        for item in items {
            if let Some(release) = sequencer.push(item) {
                out.push(describe(release));
            }
        }
        while let Some(release) = sequencer.drain_next() {
            out.push(describe(release));
        }
        assert_eq!(sequencer.buffered(), 0);
        out
    }

    #[test]
    fn test_versions_inside_window_are_reordered() {
        let released = run(
            4,
            vec![doc("a.txt", 2), doc("b.txt", 1), doc("a.txt", 1), doc("a.txt", 3)],
        );
        assert_eq!(released, vec!["a.txt@1", "a.txt@2", "b.txt@1", "a.txt@3"]);
    }

    #[test]
    fn test_versions_beyond_window_are_out_of_order() {
        let released = run(1, vec![doc("a.txt", 2), doc("b.txt", 1), doc("a.txt", 1)]);
        assert_eq!(released, vec!["a.txt@2", "b.txt@1", "late a.txt@1 after 2"]);
    }

    #[test]
    fn test_equal_versions_keep_arrival_order() {
        let mut sequencer = VersionSequencer::new(8, 64);
        sequencer.push(doc("a.txt", 1).with_properties(
            [("n".to_string(), vec!["first".to_string()])].into_iter().collect(),
        ));
        sequencer.push(doc("a.txt", 1));

        match sequencer.drain_next() {
            Some(Release::Ready(item)) => assert_eq!(item.properties.first("n"), Some("first")),
            other => panic!("unexpected release: {:?}", other),
        }
        assert!(matches!(sequencer.drain_next(), Some(Release::Ready(_))));
        assert!(sequencer.drain_next().is_none());
    }

    #[test]
    fn test_released_versions_stay_within_horizon() {
        let mut sequencer = VersionSequencer::new(4, 16);
        for n in 0..10_000 {
            sequencer.push(doc(&format!("file-{}.txt", n), 1));
            assert!(sequencer.remembered() <= 16);
        }
        while sequencer.drain_next().is_some() {}

        assert_eq!(sequencer.buffered(), 0);
        assert_eq!(sequencer.remembered(), 16);
    }

    #[test]
    fn test_recently_released_identity_is_still_checked() {
        let mut sequencer = VersionSequencer::new(1, 2);
        let mut out = Vec::new();
        for item in [doc("a.txt", 2), doc("b.txt", 1), doc("a.txt", 1)] {
            out.extend(sequencer.push(item).map(describe));
        }
        out.extend(sequencer.drain_next().map(describe));
        assert_eq!(out, vec!["a.txt@2", "b.txt@1", "late a.txt@1 after 2"]);

        // a.txt falls out of a horizon of one once b.txt is released
        let mut sequencer = VersionSequencer::new(1, 1);
        let mut out = Vec::new();
        for item in [doc("a.txt", 2), doc("b.txt", 1), doc("a.txt", 1)] {
            out.extend(sequencer.push(item).map(describe));
        }
        out.extend(sequencer.drain_next().map(describe));
        assert_eq!(out, vec!["a.txt@2", "b.txt@1", "a.txt@1"]);
    }
}
