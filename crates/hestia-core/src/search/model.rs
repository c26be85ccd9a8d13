//! Search domain models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single result returned by the search backend.
///
/// Immutable once returned; the `key` is the stable identifier the user
/// selects by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Stable identifier, unique within the backend.
    pub key: String,
    /// Human-readable title shown in result lists.
    pub title: String,
    /// Arbitrary display fields (price, beds, city, picture URL, ...).
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl SearchHit {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a display field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// The query sent to the search backend for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text portion of the query.
    pub text: String,
    /// Named filters, each with its current value list.
    pub refinements: Vec<(String, Vec<String>)>,
    /// 1-based page number.
    pub page: u32,
}

/// Result of one search execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The current page of hits, replaced wholesale on each execution.
    pub hits: Vec<SearchHit>,
    /// Total number of matches across all pages.
    pub total: usize,
}

impl SearchResponse {
    /// Creates an empty response (zero hits).
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
        }
    }
}
