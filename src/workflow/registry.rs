//! Path registry: interned path strings with producer/consumer
//! back-references.
//!
//! Jobs and paths reference each other through identifier keys held in a
//! central arena rather than through shared ownership. The registry never
//! touches the filesystem.

use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};

/// Producer/consumer bookkeeping for one registered path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathEntry {
    /// The single job producing this path, if any.
    pub producer: Option<String>,
    /// Jobs consuming this path.
    pub consumers: BTreeSet<String>,
}

impl PathEntry {
    fn is_orphan(&self) -> bool {
        self.producer.is_none() && self.consumers.is_empty()
    }
}

/// Mapping from normalized path string to its entry, preserving
/// insertion order for listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathRegistry {
    entries: HashMap<String, PathEntry>,
    order: Vec<String>,
}

/// Normalize a raw path: trim surrounding whitespace, reject empty.
/// Case and separators are preserved exactly.
pub fn normalize_path(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidName(format!("empty path '{raw}'")));
    }
    Ok(trimmed.to_string())
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&PathEntry> {
        self.entries.get(path)
    }

    /// The job producing `path`, if the path is registered and produced.
    pub fn producer(&self, path: &str) -> Option<&str> {
        self.entries.get(path)?.producer.as_deref()
    }

    /// Registered paths in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathEntry)> {
        self.order
            .iter()
            .map(|path| (path.as_str(), &self.entries[path]))
    }

    /// Registered path strings in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    fn entry_mut(&mut self, path: &str) -> &mut PathEntry {
        if !self.entries.contains_key(path) {
            self.entries.insert(path.to_string(), PathEntry::default());
            self.order.push(path.to_string());
        }
        self.entries.get_mut(path).expect("entry just inserted")
    }

    /// Record `job` as a consumer of `path`.
    pub fn attach_consumer(&mut self, path: &str, job: &str) {
        self.entry_mut(path).consumers.insert(job.to_string());
    }

    /// Record `job` as the producer of `path`.
    ///
    /// The caller is responsible for checking the single-writer invariant
    /// beforehand; attaching over an existing producer is a logic error.
    pub fn attach_producer(&mut self, path: &str, job: &str) {
        let entry = self.entry_mut(path);
        debug_assert!(entry.producer.is_none());
        entry.producer = Some(job.to_string());
    }

    /// Drop every reference `job` holds on `path`; the path itself is
    /// removed once orphaned.
    pub fn detach(&mut self, path: &str, job: &str) {
        let Some(entry) = self.entries.get_mut(path) else {
            return;
        };
        entry.consumers.remove(job);
        if entry.producer.as_deref() == Some(job) {
            entry.producer = None;
        }
        if entry.is_orphan() {
            self.entries.remove(path);
            self.order.retain(|p| p != path);
        }
    }
}
