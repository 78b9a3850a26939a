//! Scribe CLI: the main entry point.
//!
//! Commands:
//! - `run`        One-shot task
//! - `chat`       Interactive session (`/reset` clears history)
//! - `config`     Show, locate or initialise the configuration
//! - `providers`  List supported vendors and configured profiles

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "scribe",
    about = "Scribe: LLM-driven source editing with operator approval",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Provider profile from the [profiles] table
    #[arg(short, long, global = true, env = "SCRIBE_PROFILE")]
    profile: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task and exit
    Run {
        /// The task for the agent
        #[arg(short, long)]
        message: String,

        /// Apply changes without asking
        #[arg(long)]
        yes: bool,
    },

    /// Start an interactive session
    Chat {
        /// Apply changes without asking
        #[arg(long)]
        yes: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// List supported providers
    Providers,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let profile = cli.profile.as_deref();
    match cli.command {
        Commands::Run { message, yes } => commands::run::run(profile, &message, yes).await?,
        Commands::Chat { yes } => commands::chat::run(profile, yes).await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Init => commands::config_cmd::init()?,
        },
        Commands::Providers => commands::providers::run()?,
    }

    Ok(())
}
