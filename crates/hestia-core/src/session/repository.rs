//! Session repository trait.
//!
//! Defines the interface for session persistence operations, decoupling the
//! dialog core from the specific storage mechanism (JSON files, a database,
//! a remote store).

use async_trait::async_trait;

use super::model::Session;
use crate::error::Result;

/// An abstract repository for managing session persistence.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    /// - `Ok(Some(Session))`: session found
    /// - `Ok(None)`: session not found
    /// - `Err(_)`: storage failure
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Saves a session to storage, replacing any previous version.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Deletes a session from storage (absent sessions are not an error).
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Lists all stored sessions.
    async fn list_all(&self) -> Result<Vec<Session>>;

    /// Gets the ID of the currently active session, if any.
    async fn get_active_session_id(&self) -> Result<Option<String>>;

    /// Marks a session as the active one.
    async fn set_active_session_id(&self, session_id: &str) -> Result<()>;
}
