//! Tracking which top-level keys changed since the last successful flush.

use std::collections::BTreeSet;

/// Top-level keys with unpersisted changes.
///
/// A save drains the set when it captures the document and hands the keys
/// back with [`DirtyTracker::restore`] if the write then fails, so keys touched
/// while a save is in flight are never lost.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    keys: BTreeSet<String>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, key: impl Into<String>) {
        self.keys.insert(key.into());
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Sorted copy of the dirty keys.
    pub fn keys(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    /// Take every dirty key, leaving the set empty.
    pub fn drain(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.keys)
    }

    /// Put back keys taken by a flush that did not complete.
    pub fn restore(&mut self, keys: BTreeSet<String>) {
        self.keys.extend(keys);
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
