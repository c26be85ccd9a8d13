//! JSON-file SessionRepository implementation.
//!
//! Stores each session as an individual JSON file plus a marker file for
//! the active session:
//!
//! ```text
//! base_dir/
//! ├── sessions/
//! │   ├── <session-id-1>.json
//! │   └── <session-id-2>.json
//! └── active_session
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use hestia_core::error::{HestiaError, Result};
use hestia_core::session::{Session, SessionRepository};

pub struct JsonSessionRepository {
    base_dir: PathBuf,
}

impl JsonSessionRepository {
    /// Creates a repository rooted at `base_dir`, creating the directory
    /// structure if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(base_dir.join("sessions"))
            .map_err(|e| HestiaError::io(format!("failed to create sessions directory: {e}")))?;
        Ok(Self { base_dir })
    }

    /// Creates a repository at the default location (`~/.hestia`).
    pub fn default_location() -> Result<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| HestiaError::config("failed to determine home directory"))?;
        Self::new(home_dir.join(".hestia"))
    }

    fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join("sessions")
            .join(format!("{}.json", session_id))
    }

    fn active_marker_path(&self) -> PathBuf {
        self.base_dir.join("active_session")
    }
}

#[async_trait]
impl SessionRepository for JsonSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let path = self.session_file_path(session_id);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(HestiaError::data_access(format!(
                    "failed to read session {session_id}: {err}"
                )))
            }
        };
        let session: Session = serde_json::from_str(&raw)?;
        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_file_path(&session.id);
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&path, json).await.map_err(|err| {
            HestiaError::data_access(format!("failed to write session {}: {err}", session.id))
        })?;
        tracing::debug!(session_id = %session.id, "session saved");
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.session_file_path(session_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(HestiaError::data_access(format!(
                "failed to delete session {session_id}: {err}"
            ))),
        }
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let sessions_dir = self.base_dir.join("sessions");
        let mut entries = fs::read_dir(&sessions_dir)
            .await
            .map_err(|err| HestiaError::data_access(format!("failed to list sessions: {err}")))?;

        let mut sessions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| HestiaError::data_access(format!("failed to list sessions: {err}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path).await.map_err(|err| {
                HestiaError::data_access(format!("failed to read {}: {err}", path.display()))
            })?;
            match serde_json::from_str::<Session>(&raw) {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    // Skip unreadable files rather than failing the listing.
                    tracing::warn!(path = %path.display(), error = %err, "skipping malformed session file");
                }
            }
        }
        Ok(sessions)
    }

    async fn get_active_session_id(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.active_marker_path()).await {
            Ok(raw) => {
                let id = raw.trim().to_string();
                Ok(if id.is_empty() { None } else { Some(id) })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(HestiaError::data_access(format!(
                "failed to read active session marker: {err}"
            ))),
        }
    }

    async fn set_active_session_id(&self, session_id: &str) -> Result<()> {
        fs::write(self.active_marker_path(), session_id)
            .await
            .map_err(|err| {
                HestiaError::data_access(format!("failed to write active session marker: {err}"))
            })
    }
}
