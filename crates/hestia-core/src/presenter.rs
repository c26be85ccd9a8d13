//! Presentation collaborator trait.

use async_trait::async_trait;

use crate::search::SearchHit;

/// Renders dialog output to whatever surface hosts the conversation.
///
/// Fire-and-forget from the dialog's perspective: rendering problems are the
/// host's concern and never change a state transition, so these methods are
/// infallible by contract.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Renders the current result page under a caption.
    async fn render_results(&self, hits: &[SearchHit], caption: &str);

    /// Renders the accumulated selection list under a caption.
    async fn render_selections(&self, hits: &[SearchHit], caption: &str);

    /// Posts a plain text message.
    async fn post_text(&self, message: &str);
}
