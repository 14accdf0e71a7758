use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of source identifiers whose chunks are all present in an index.
///
/// Each index owns one registry, persisted next to its artifacts and written
/// in the same commit, after the index data itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRegistry {
    sources: BTreeSet<String>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.sources.contains(source)
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, sources: I) {
        self.sources.extend(sources);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(String::as_str)
    }
}
