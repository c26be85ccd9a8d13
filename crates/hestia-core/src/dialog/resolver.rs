//! Intent resolution: mapping an NLU classification onto query mutations.

use std::sync::Arc;

use crate::error::Result;
use crate::nlu::{NluClient, NluEntity};
use crate::normalize::{capitalize_first, normalize_price, normalize_room_count};
use crate::search::QueryBuilder;

/// Room count assumed when a refinement is absent or unparsable and the
/// user asks for "more" or "fewer" rooms.
const DEFAULT_ROOM_COUNT: i64 = 2;

/// How an entity's raw text is normalized before it becomes a refinement
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    RoomCount,
    City,
    Price,
}

/// Canonical entity-type to refinement-key table.
///
/// Entities whose type is not listed here are silently dropped. Two
/// entities of the same type in one response overwrite each other, so the
/// last one processed wins; callers expecting value merging will be
/// surprised (see the overwrite tests below).
const ENTITY_REFINEMENTS: &[(&str, &str, ValueKind)] = &[
    ("number of bedrooms", "beds", ValueKind::RoomCount),
    ("number of bathrooms", "baths", ValueKind::RoomCount),
    ("builtin.geography.city", "city", ValueKind::City),
    ("city", "city", ValueKind::City),
    ("PriceBegin", "MinPrice", ValueKind::Price),
    ("PriceEnd", "MaxPrice", ValueKind::Price),
];

/// Outcome of resolving one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The user is leaving; the caller performs the goodbye side effects.
    Bye,
    /// The user wants a clean slate; the caller performs the reset.
    StartOver,
    /// The query was updated (or left alone); execute a search.
    Search,
}

/// Resolves utterances into mutations of the session's `QueryBuilder`.
///
/// Calls the NLU collaborator exactly once per invocation, with no caching
/// and no retry. All mutations happen in place on the query passed in.
pub struct IntentResolver {
    nlu: Arc<dyn NluClient>,
}

impl IntentResolver {
    pub fn new(nlu: Arc<dyn NluClient>) -> Self {
        Self { nlu }
    }

    /// Classifies `utterance` and folds the result into `query`.
    ///
    /// Returns `Bye`/`StartOver` without mutating refinements for those two
    /// intents; every other intent resolves to `Search` after its
    /// mutations. A classification failure propagates to the caller, which
    /// treats it like any other collaborator failure.
    pub async fn resolve(
        &self,
        utterance: &str,
        query: &mut QueryBuilder,
    ) -> Result<ResolveOutcome> {
        let response = self.nlu.classify(utterance).await?;
        let intent = response.top_scoring_intent.intent.as_str();
        tracing::debug!(intent, score = response.top_scoring_intent.score, "classified utterance");

        match intent {
            "house lookup" => {
                // A new lookup starts from a fresh query before new
                // entities are applied.
                query.refinements.clear();
                query.page_number = 1;
                query.search_text.clear();
                apply_entities(query, &response.entities);
                Ok(ResolveOutcome::Search)
            }
            "refinement" => {
                apply_entities(query, &response.entities);
                Ok(ResolveOutcome::Search)
            }
            "refinement - fewer rooms" => {
                adjust_room_counts(query, &response.entities, -1);
                Ok(ResolveOutcome::Search)
            }
            "refinement - more rooms" => {
                adjust_room_counts(query, &response.entities, 1);
                Ok(ResolveOutcome::Search)
            }
            "bye" => Ok(ResolveOutcome::Bye),
            "start over" => Ok(ResolveOutcome::StartOver),
            _ => {
                // "None" and anything unrecognized: keep the utterance as
                // free text, refinements untouched.
                query.search_text = utterance.to_string();
                Ok(ResolveOutcome::Search)
            }
        }
    }
}

/// Writes each recognized entity into its refinement key, normalizing the
/// value first. Writing replaces the key's existing values, so entity
/// order decides ties.
fn apply_entities(query: &mut QueryBuilder, entities: &[NluEntity]) {
    for entity in entities {
        let Some((_, key, kind)) = ENTITY_REFINEMENTS
            .iter()
            .find(|(entity_type, _, _)| *entity_type == entity.entity_type)
        else {
            tracing::debug!(entity_type = %entity.entity_type, "dropping unrecognized entity type");
            continue;
        };

        let value = match kind {
            ValueKind::RoomCount => normalize_room_count(&entity.entity),
            ValueKind::City => capitalize_first(&entity.entity),
            ValueKind::Price => normalize_price(&entity.entity),
        };
        tracing::debug!(key, %value, "setting refinement");
        query.refinements.set_single(*key, value);
    }
}

/// Applies a ±1 adjustment to the room-count refinement named by each
/// `bedroom`/`bathroom` entity.
fn adjust_room_counts(query: &mut QueryBuilder, entities: &[NluEntity], delta: i64) {
    for entity in entities {
        let key = match entity.entity_type.as_str() {
            "bedroom" => "beds",
            "bathroom" => "baths",
            _ => continue,
        };
        let adjusted = current_room_count(query, key) + delta;
        query.refinements.set_single(key, adjusted.to_string());
    }
}

/// Reads the current normalized room count for `key`, falling back to
/// `DEFAULT_ROOM_COUNT` when the refinement is absent or does not parse.
/// The default is a visible branch here, not a swallowed failure.
fn current_room_count(query: &QueryBuilder, key: &str) -> i64 {
    query
        .refinements
        .first_value(key)
        .map(normalize_room_count)
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(DEFAULT_ROOM_COUNT)
}
