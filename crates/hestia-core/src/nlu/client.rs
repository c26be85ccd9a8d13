//! NLU client trait definition.

use async_trait::async_trait;

use crate::error::Result;
use crate::nlu::NluResponse;

/// Client for classifying a user utterance into an intent plus entities.
///
/// Implementations may fail (network/service errors); the dialog layer
/// treats a failure as a per-turn condition and never retries by itself.
#[async_trait]
pub trait NluClient: Send + Sync {
    /// Classifies a single utterance.
    ///
    /// # Arguments
    /// * `utterance` - The raw user text
    ///
    /// # Returns
    /// The top-scoring intent and any extracted entities.
    async fn classify(&self, utterance: &str) -> Result<NluResponse>;
}
