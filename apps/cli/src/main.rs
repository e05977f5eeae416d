//! linkhub: local LinkHub state with gateway sync.

mod commands;
mod context;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use linkhub_core::sync::scheduler::DEFAULT_REQUEST_TIMEOUT_SECS;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::context::{initialize_context, ContextConfig};

#[derive(Parser, Debug)]
#[command(name = "linkhub", version)]
#[command(about = "Manage LinkHub data locally and sync it through a gateway")]
struct Cli {
    /// SQLite database holding the local state
    #[arg(long, env = "LINKHUB_DB", default_value = "linkhub.db")]
    db: PathBuf,

    /// Gateway endpoint (overrides the saved one)
    #[arg(long, env = "LINKHUB_ENDPOINT")]
    endpoint: Option<String>,

    /// Origin sent to the gateway
    #[arg(long, env = "LINKHUB_ORIGIN")]
    origin: Option<String>,

    /// Timeout for each gateway request, in seconds
    #[arg(long, env = "LINKHUB_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Skip the startup load from the gateway
    #[arg(long)]
    offline: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show local state, settings and sync times
    Status,
    /// Push the local state to the gateway
    Push,
    /// Replace the local state with the gateway's
    Pull {
        /// Replace local data even when the gateway returns nothing
        #[arg(long)]
        force: bool,
    },
    /// Show the gateway's diagnostics
    Diagnose,
    /// Import collections from a folder of JSON files
    Import { dir: PathBuf },
    /// Print or write the local state as JSON
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Insert or replace a record, e.g. `add links '{"id":"l1","url":"..."}'`
    Add { collection: String, record: String },
    /// Delete all local data
    Clear,
    /// Change saved settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Save the gateway endpoint
    SetEndpoint { endpoint: String },
    /// Turn remote autosave on or off
    Autosave { mode: Toggle },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

impl Command {
    /// Commands that read or change the state start from the remote copy
    /// when nothing is stored locally.
    fn wants_autoload(&self) -> bool {
        matches!(
            self,
            Command::Status
                | Command::Push
                | Command::Export { .. }
                | Command::Import { .. }
                | Command::Add { .. }
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("linkhub={},{}", cli.log_level, cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let context = initialize_context(&ContextConfig {
        db_path: cli.db.clone(),
        endpoint: cli.endpoint.clone(),
        origin: cli.origin.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
    })?;

    if !cli.offline && cli.command.wants_autoload() {
        if let Some(message) = commands::autoload(&context).await {
            eprint!("{}", message);
        }
    }

    let result = match &cli.command {
        Command::Status => commands::status(&context),
        Command::Push => commands::push(&context).await,
        Command::Pull { force } => commands::pull(&context, *force).await,
        Command::Diagnose => commands::diagnose(&context).await,
        Command::Import { dir } => commands::import(&context, dir),
        Command::Export { out } => commands::export(&context, out.as_deref()),
        Command::Add { collection, record } => commands::add(&context, collection, record),
        Command::Clear => commands::clear(&context).await,
        Command::Config(ConfigCommand::SetEndpoint { endpoint }) => {
            commands::set_endpoint(&context, endpoint)
        }
        Command::Config(ConfigCommand::Autosave { mode }) => {
            commands::set_autosave(&context, matches!(mode, Toggle::On))
        }
    };

    // Pending local saves and autosave pushes run before exit.
    debug!("Flushing pending writes");
    context.sync_service.flush().await;

    print!("{}", result?);
    Ok(())
}
