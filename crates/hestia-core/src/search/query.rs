//! Incrementally-refined search query state.
//!
//! One `QueryBuilder` is owned by one conversation session and lives as long
//! as the session does. Every turn mutates it (new refinements, page bumps,
//! resets) and every search execution snapshots it into a `SearchQuery`.

use serde::{Deserialize, Serialize};

use super::model::SearchQuery;

/// Ordered mapping of refinement key to its current value list.
///
/// Keys are unique and hold exactly one value list; setting a key that
/// already exists replaces its values in place, preserving the key's
/// first-seen position. Backed by a Vec of pairs so serialization and
/// iteration order are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Refinements(Vec<(String, Vec<String>)>);

impl Refinements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a refinement, replacing any existing value list for the key.
    pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
        let key = key.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = values;
        } else {
            self.0.push((key, values));
        }
    }

    /// Sets a refinement to a single value.
    pub fn set_single(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, vec![value.into()]);
    }

    /// Returns the value list for a key, if present.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Returns the first value for a key, if present.
    pub fn first_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(|s| s.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Builds the query executed against the search backend.
///
/// Invariant: `reset()` clears refinements and resets the page to 1 but does
/// not touch `search_text`; clearing the text is always an explicit
/// assignment by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBuilder {
    pub search_text: String,
    pub refinements: Refinements,
    pub page_number: u32,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            refinements: Refinements::new(),
            page_number: 1,
        }
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears refinements and resets paging. `search_text` is untouched.
    pub fn reset(&mut self) {
        self.refinements.clear();
        self.page_number = 1;
    }

    /// Advances to the next result page.
    pub fn next_page(&mut self) {
        self.page_number += 1;
    }

    /// Snapshots the current state into the query sent to the backend.
    pub fn build(&self) -> SearchQuery {
        SearchQuery {
            text: self.search_text.clone(),
            refinements: self
                .refinements
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
            page: self.page_number,
        }
    }
}
