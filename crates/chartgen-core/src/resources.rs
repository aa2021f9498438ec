//! Named resources available to a chart build
//!
//! Notes templates are referenced by logical name (for example
//! `/NOTES.template.txt`). A `ResourceProvider` resolves those names to
//! contents; the default provider ships the built-in notes template and can
//! be extended with in-memory entries or extra search directories.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::DEFAULT_NOTES;
use crate::error::Result;

const DEFAULT_NOTES_CONTENT: &str = include_str!("../resources/NOTES.template.txt");

/// Trait for resolving logical resource names
pub trait ResourceProvider {
    /// Contents of the named resource, `None` when it does not exist
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// Built-in resources plus optional search directories
///
/// Search directories are consulted first, in the order they were added,
/// then the in-memory entries.
#[derive(Debug, Clone)]
pub struct EmbeddedResources {
    entries: HashMap<String, Vec<u8>>,
    search_dirs: Vec<PathBuf>,
}

impl EmbeddedResources {
    /// Provider holding the built-in notes template
    pub fn new() -> Self {
        Self::empty().with_resource(DEFAULT_NOTES, DEFAULT_NOTES_CONTENT)
    }

    /// Provider without any resource
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            search_dirs: Vec::new(),
        }
    }

    pub fn with_resource(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.entries
            .insert(normalize(name).to_string(), content.into());
        self
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }
}

impl Default for EmbeddedResources {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProvider for EmbeddedResources {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let name = normalize(name);
        if name.is_empty() {
            return Ok(None);
        }

        for dir in &self.search_dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(Some(std::fs::read(candidate)?));
            }
        }

        Ok(self.entries.get(name).cloned())
    }
}

/// Logical names may be written with or without a leading slash
fn normalize(name: &str) -> &str {
    name.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_notes_available() {
        let resources = EmbeddedResources::new();

        let notes = resources.load(DEFAULT_NOTES).unwrap().unwrap();
        assert!(String::from_utf8(notes).unwrap().contains(".Release.Name"));

        // Leading slash is optional
        assert!(resources.load("NOTES.template.txt").unwrap().is_some());
    }

    #[test]
    fn test_missing_resource() {
        let resources = EmbeddedResources::empty();
        assert!(resources.load("/missing.txt").unwrap().is_none());
        assert!(resources.load("").unwrap().is_none());
    }

    #[test]
    fn test_search_dir_takes_precedence() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("NOTES.template.txt"), "custom notes").unwrap();

        let resources = EmbeddedResources::new().with_search_dir(temp.path());
        let notes = resources.load(DEFAULT_NOTES).unwrap().unwrap();

        assert_eq!(notes, b"custom notes");
    }
}
