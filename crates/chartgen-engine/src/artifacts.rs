//! Registry of the files produced by a chart build

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Output paths of a build with their content
///
/// Generated text files carry their content. Copied files and created
/// directories carry an empty string, the packaged archive carries `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    entries: BTreeMap<PathBuf, Option<String>>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.entries.insert(path.into(), Some(content.into()));
    }

    /// Register a copied file or a created directory
    pub fn insert_marker(&mut self, path: impl Into<PathBuf>) {
        self.entries.insert(path.into(), Some(String::new()));
    }

    /// Register a binary file such as the chart archive
    pub fn insert_binary(&mut self, path: impl Into<PathBuf>) {
        self.entries.insert(path.into(), None);
    }

    pub fn get(&self, path: &Path) -> Option<&Option<String>> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Option<String>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<PathBuf, Option<String>> {
        self.entries
    }
}
