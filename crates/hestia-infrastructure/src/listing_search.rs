//! Local listing-catalog search backend.
//!
//! Implements the core's `SearchClient` over a JSON catalog of listings.
//! The real deployment would point at a hosted search index; the query
//! contract (free text + refinements + page) is identical, so the dialog
//! cannot tell the difference.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use hestia_core::error::{HestiaError, Result};
use hestia_core::search::{SearchClient, SearchHit, SearchQuery, SearchResponse};

const PAGE_SIZE: usize = 5;

/// One property in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub key: String,
    pub title: String,
    pub city: String,
    pub beds: u32,
    pub baths: u32,
    pub price: u64,
}

impl Listing {
    fn to_hit(&self) -> SearchHit {
        SearchHit::new(&self.key, &self.title)
            .with_field("city", &self.city)
            .with_field("beds", self.beds.to_string())
            .with_field("baths", self.baths.to_string())
            .with_field("price", self.price.to_string())
    }

    fn matches_text(&self, text: &str) -> bool {
        let needle = text.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.city.to_lowercase().contains(&needle)
    }

    /// Applies one refinement. Unparsable numeric values make the filter a
    /// no-op; garbage in the query is tolerated, not rejected.
    fn matches_refinement(&self, key: &str, value: &str) -> bool {
        match key {
            "beds" => value.parse::<u32>().map_or(true, |min| self.beds >= min),
            "baths" => value.parse::<u32>().map_or(true, |min| self.baths >= min),
            "city" => self.city.eq_ignore_ascii_case(value),
            "MinPrice" => value.parse::<u64>().map_or(true, |min| self.price >= min),
            "MaxPrice" => value.parse::<u64>().map_or(true, |max| self.price <= max),
            // Unknown refinement keys never filter anything out.
            _ => true,
        }
    }
}

/// In-process `SearchClient` over a listing catalog.
pub struct ListingSearch {
    listings: Vec<Listing>,
}

impl ListingSearch {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self { listings }
    }

    /// Loads a catalog from a JSON file (an array of listings).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            HestiaError::io(format!("failed to read listings {}: {err}", path.display()))
        })?;
        let listings: Vec<Listing> = serde_json::from_str(&raw)?;
        tracing::info!(count = listings.len(), path = %path.display(), "loaded listing catalog");
        Ok(Self::new(listings))
    }

    fn matches(&self, listing: &Listing, query: &SearchQuery) -> bool {
        let text = query.text.trim();
        if !text.is_empty() && !listing.matches_text(text) {
            return false;
        }
        query.refinements.iter().all(|(key, values)| {
            values
                .iter()
                .all(|value| listing.matches_refinement(key, value))
        })
    }
}

#[async_trait]
impl SearchClient for ListingSearch {
    async fn execute(&self, query: &SearchQuery) -> Result<SearchResponse> {
        if query.page < 1 {
            return Err(HestiaError::search(format!(
                "page numbers are 1-based, got {}",
                query.page
            )));
        }

        let matched: Vec<&Listing> = self
            .listings
            .iter()
            .filter(|listing| self.matches(listing, query))
            .collect();
        let total = matched.len();

        let start = (query.page as usize - 1) * PAGE_SIZE;
        let hits = matched
            .into_iter()
            .skip(start)
            .take(PAGE_SIZE)
            .map(Listing::to_hit)
            .collect();

        tracing::debug!(total, page = query.page, "listing search executed");
        Ok(SearchResponse { hits, total })
    }

    fn top_refiners(&self) -> Vec<String> {
        ["beds", "baths", "city", "MinPrice", "MaxPrice"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}
