//! Search boundary: query construction and the backend client trait.
//!
//! The index/ranking implementation is an external collaborator. The core
//! owns the query that is sent to it: free text, named refinements and a
//! page number, refined incrementally across turns.

pub mod client;
pub mod model;
pub mod query;

pub use client::SearchClient;
pub use model::{SearchHit, SearchQuery, SearchResponse};
pub use query::{QueryBuilder, Refinements};
