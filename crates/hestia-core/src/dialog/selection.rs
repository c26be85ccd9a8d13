//! Current result page and cross-turn selection tracking.

use serde::{Deserialize, Serialize};

use crate::search::SearchHit;

/// The current page of results, replaced wholesale on each search
/// execution (never merged).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultPage {
    pub hits: Vec<SearchHit>,
}

impl ResultPage {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    /// Looks up a hit by its stable key.
    pub fn find_by_key(&self, key: &str) -> Option<&SearchHit> {
        self.hits.iter().find(|h| h.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// The hits the user has picked so far.
///
/// Set-by-key semantics over a list: append-only, first-seen order, and a
/// hit whose key is already present is never re-appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionSet {
    selected: Vec<SearchHit>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hit unless its key is already present. Returns whether the
    /// hit was actually appended.
    pub fn add(&mut self, hit: SearchHit) -> bool {
        if self.selected.iter().any(|h| h.key == hit.key) {
            return false;
        }
        self.selected.push(hit);
        true
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn into_hits(self) -> Vec<SearchHit> {
        self.selected
    }
}
