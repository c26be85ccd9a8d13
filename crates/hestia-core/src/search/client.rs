//! Search client trait definition.

use async_trait::async_trait;

use crate::error::Result;
use crate::search::{SearchQuery, SearchResponse};

/// Client for executing queries against the search backend.
///
/// Zero hits and a failed call are distinct outcomes: the dialog offers a
/// retry on the former and posts a fallback message on the latter.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Executes a search built from the session's query state.
    async fn execute(&self, query: &SearchQuery) -> Result<SearchResponse>;

    /// Returns the refinement keys offered to the user in the refine
    /// sub-flow. The backend knows which of its fields are facetable.
    fn top_refiners(&self) -> Vec<String>;
}
