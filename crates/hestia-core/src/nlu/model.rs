//! NLU response models.
//!
//! Field names mirror the LUIS v2 JSON wire format so responses deserialize
//! directly. The response is transient: produced once per turn, folded into
//! the query, never persisted.

use serde::{Deserialize, Serialize};

/// A classified intent with its confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluIntent {
    pub intent: String,
    pub score: f32,
}

/// A typed span of the utterance ("two" as `number of bedrooms`, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluEntity {
    /// The raw text of the span.
    pub entity: String,
    /// The entity type name assigned by the NLU service.
    #[serde(rename = "type")]
    pub entity_type: String,
    pub score: f32,
}

/// One classification result: a top intent plus zero or more entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluResponse {
    #[serde(rename = "topScoringIntent")]
    pub top_scoring_intent: NluIntent,
    #[serde(default)]
    pub entities: Vec<NluEntity>,
}

impl NluResponse {
    /// Builds a response with the given intent name and no entities.
    /// Useful for tests and fallback paths.
    pub fn intent_only(intent: impl Into<String>, score: f32) -> Self {
        Self {
            top_scoring_intent: NluIntent {
                intent: intent.into(),
                score,
            },
            entities: Vec::new(),
        }
    }
}
