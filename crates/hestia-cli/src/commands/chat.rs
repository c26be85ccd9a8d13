//! The interactive chat loop.
//!
//! Implements the prompt collaborator over stdin/stdout: the dialog core
//! returns a `TurnRequest`, this loop collects the matching input and
//! feeds it back. Confirmation prompts get a bounded number of attempts;
//! exhaustion is reported to the core as `ConfirmAborted`. The session is
//! persisted after every turn so an interrupted conversation can be
//! resumed with `--resume`.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

use hestia_core::dialog::{SearchDialog, TurnInput, TurnRequest};
use hestia_core::presenter::Presenter;
use hestia_core::search::SearchHit;
use hestia_core::session::{Session, SessionRepository};
use hestia_infrastructure::{JsonSessionRepository, ListingSearch, LuisNluClient};

/// How many malformed confirmation replies we accept before giving up.
const CONFIRM_ATTEMPTS: usize = 3;

pub async fn run(
    repository: JsonSessionRepository,
    multi: bool,
    listings: &Path,
    resume: Option<String>,
) -> Result<()> {
    let nlu = Arc::new(LuisNluClient::try_from_env().context("NLU configuration missing")?);
    let search = Arc::new(ListingSearch::from_file(listings)?);
    let presenter = Arc::new(ConsolePresenter);
    let dialog =
        SearchDialog::new(nlu, search, presenter).with_multiple_selection(multi);

    let (mut session, resumed) = match resume {
        Some(id) => {
            let session = repository
                .find_by_id(&id)
                .await?
                .ok_or_else(|| anyhow!("session not found: {id}"))?;
            println!("Resuming session '{}' ({})", session.title, session.id);
            (session, true)
        }
        None => (Session::new("house hunt"), false),
    };
    repository.set_active_session_id(&session.id).await?;

    let mut request = if resumed {
        dialog.resume(&mut session.state)
    } else {
        dialog.start(&mut session.state)
    };

    loop {
        session.touch();
        repository.save(&session).await?;

        let input = match request {
            TurnRequest::PromptText(message) => match read_line(Some(&message))? {
                Some(text) => TurnInput::Text(text),
                None => break,
            },
            TurnRequest::AwaitInput => match read_line(None)? {
                Some(text) => TurnInput::Text(text),
                None => break,
            },
            TurnRequest::PromptConfirm(message) => read_confirm(&message)?,
            TurnRequest::Completed(outcome) => {
                print_outcome(outcome.as_deref());
                break;
            }
        };

        request = dialog.take_turn(&mut session.state, input).await;
    }

    session.touch();
    repository.save(&session).await?;
    Ok(())
}

/// Reads one line of input, printing the prompt first if there is one.
/// Returns `None` on end of input.
fn read_line(prompt: Option<&str>) -> Result<Option<String>> {
    if let Some(prompt) = prompt {
        println!("{prompt}");
    }
    print!("> ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        println!();
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Asks a yes/no question, allowing up to `CONFIRM_ATTEMPTS` malformed
/// replies before reporting exhaustion.
fn read_confirm(message: &str) -> Result<TurnInput> {
    for attempt in 0..CONFIRM_ATTEMPTS {
        let prompt = if attempt == 0 {
            format!("{message} (yes/no)")
        } else {
            "Please answer yes or no.".to_string()
        };
        let Some(reply) = read_line(Some(&prompt))? else {
            return Ok(TurnInput::ConfirmAborted);
        };
        if let Some(answer) = parse_confirm(&reply) {
            return Ok(TurnInput::Confirm(answer));
        }
    }
    Ok(TurnInput::ConfirmAborted)
}

fn parse_confirm(reply: &str) -> Option<bool> {
    match reply.trim().to_lowercase().as_str() {
        "y" | "yes" | "yeah" | "yep" | "sure" => Some(true),
        "n" | "no" | "nope" => Some(false),
        _ => None,
    }
}

fn print_outcome(outcome: Option<&[SearchHit]>) {
    match outcome {
        Some(hits) if !hits.is_empty() => {
            println!("Your picks:");
            for hit in hits {
                println!("{}", format_hit(hit));
            }
        }
        Some(_) => println!("No listings selected."),
        None => println!("Search ended with no matches."),
    }
}

fn format_hit(hit: &SearchHit) -> String {
    let mut line = format!("  [{}] {}", hit.key, hit.title);
    let mut details = Vec::new();
    if let Some(city) = hit.fields.get("city") {
        details.push(city.clone());
    }
    if let (Some(beds), Some(baths)) = (hit.fields.get("beds"), hit.fields.get("baths")) {
        details.push(format!("{beds} bd / {baths} ba"));
    }
    if let Some(price) = hit.fields.get("price") {
        details.push(format!("${price}"));
    }
    if !details.is_empty() {
        line.push_str(&format!(" - {}", details.join(", ")));
    }
    line
}

/// Presenter that renders to the terminal.
struct ConsolePresenter;

#[async_trait]
impl Presenter for ConsolePresenter {
    async fn render_results(&self, hits: &[SearchHit], caption: &str) {
        println!("{caption}");
        for hit in hits {
            println!("{}", format_hit(hit));
        }
    }

    async fn render_selections(&self, hits: &[SearchHit], caption: &str) {
        println!("{caption}");
        for hit in hits {
            println!("{}", format_hit(hit));
        }
    }

    async fn post_text(&self, message: &str) {
        println!("{message}");
    }
}
