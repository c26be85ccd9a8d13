//! Stored-session management commands.

use anyhow::Result;

use hestia_core::session::SessionRepository;
use hestia_infrastructure::JsonSessionRepository;

pub async fn list(repository: JsonSessionRepository) -> Result<()> {
    let mut sessions = repository.list_all().await?;
    if sessions.is_empty() {
        println!("No stored sessions.");
        return Ok(());
    }

    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let active = repository.get_active_session_id().await?;

    for session in sessions {
        let marker = if active.as_deref() == Some(session.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  {}  updated {}  ({} selected)",
            marker,
            session.id,
            session.title,
            session.updated_at,
            session.state.selections.len()
        );
    }
    Ok(())
}

pub async fn delete(repository: JsonSessionRepository, session_id: &str) -> Result<()> {
    repository.delete(session_id).await?;
    println!("Deleted session {session_id}.");
    Ok(())
}
