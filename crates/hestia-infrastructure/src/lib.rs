//! Infrastructure adapters for Hestia.
//!
//! Concrete implementations of the core's collaborator traits: the LUIS
//! HTTP NLU client, the JSON-file session repository, and the local
//! listing-catalog search backend.

pub mod listing_search;
pub mod luis_client;
pub mod session_repository;

pub use listing_search::{Listing, ListingSearch};
pub use luis_client::{LuisConfig, LuisNluClient};
pub use session_repository::JsonSessionRepository;
