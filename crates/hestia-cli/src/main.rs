use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hestia_infrastructure::JsonSessionRepository;

mod commands;

#[derive(Parser)]
#[command(name = "hestia")]
#[command(about = "Hestia - conversational real-estate search", long_about = None)]
struct Cli {
    /// Data directory for session storage (defaults to ~/.hestia)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start or resume an interactive search conversation
    Chat {
        /// Accumulate multiple listings into a list instead of picking one
        #[arg(long)]
        multi: bool,

        /// Path to the listing catalog JSON file
        #[arg(long, default_value = "demos/listings.json")]
        listings: PathBuf,

        /// Resume the given session instead of starting a new one
        #[arg(long)]
        resume: Option<String>,
    },
    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List stored sessions
    List,
    /// Delete a stored session
    Delete { session_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let repository = match &cli.data_dir {
        Some(dir) => JsonSessionRepository::new(dir)?,
        None => JsonSessionRepository::default_location()?,
    };

    match cli.command {
        Commands::Chat {
            multi,
            listings,
            resume,
        } => commands::chat::run(repository, multi, &listings, resume).await?,
        Commands::Sessions { action } => match action {
            SessionAction::List => commands::sessions::list(repository).await?,
            SessionAction::Delete { session_id } => {
                commands::sessions::delete(repository, &session_id).await?
            }
        },
    }

    Ok(())
}
