use crate::{
    schema::ArgumentSchema,
    types::{OptionItem, UpstreamValues},
};
use std::collections::HashMap;

/// Values of an argument's `depends_on` list, component-wise, with absence
/// distinct from an empty value.
pub type CacheKey = UpstreamValues;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub options: Vec<OptionItem>,
}

/// Option lists already fetched during one configuration session,
/// per argument and per upstream tuple.
///
/// Owned by the caller and passed into every resolution; nothing in the
/// runtime keeps one behind the caller's back.
#[derive(Debug, Clone, Default)]
pub struct OptionCache {
    entries: HashMap<String, HashMap<CacheKey, CacheEntry>>,
}

impl OptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, argument: &str, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(argument).and_then(|by_key| by_key.get(key))
    }

    pub fn insert(&mut self, argument: &str, key: CacheKey, entry: CacheEntry) {
        self.entries
            .entry(argument.to_owned())
            .or_default()
            .insert(key, entry);
    }

    /// Drop every entry of `argument`.
    pub fn invalidate(&mut self, argument: &str) -> usize {
        self.entries
            .remove(argument)
            .map(|by_key| by_key.len())
            .unwrap_or_default()
    }

    /// `changed` got a new value: every entry of its transitive dependents
    /// has a stale key now. Returns the number of dropped entries.
    pub fn invalidate_dependents(&mut self, schema: &ArgumentSchema, changed: &str) -> usize {
        schema
            .dependents_of(changed)
            .iter()
            .map(|dependent| self.invalidate(dependent))
            .sum()
    }

    /// Total number of cached option lists.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
