//! Dirflow CLI — the main entry point.
//!
//! Commands:
//! - `serve`     — Start the HTTP API server
//! - `chat`      — Run a single exchange and print the result as JSON
//! - `providers` — Show configured providers and their availability
//! - `doctor`    — Diagnose configuration and credentials
//! - `validate`  — Run the command validator on a JSON literal

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dirflow_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "dirflow",
    about = "Dirflow — structured command orchestration for file assistants",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of ~/.dirflow/config.toml
    #[arg(short, long, global = true, env = "DIRFLOW_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message through the pipeline
    Chat {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Provider to use (claude, openai, gemini, local)
        #[arg(long)]
        provider: Option<String>,

        /// Model to use instead of the provider default
        #[arg(long)]
        model: Option<String>,

        /// Current directory reported in the request context
        #[arg(long)]
        path: Option<String>,
    },

    /// Show configured providers
    Providers,

    /// Diagnose configuration and credentials
    Doctor,

    /// Validate a proposed command (or array of commands) given as JSON
    Validate {
        /// JSON object or array, e.g. '{"action":"read_file","path":"a.txt"}'
        json: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(load_config(&cli.config)?, port).await?,
        Commands::Chat {
            message,
            provider,
            model,
            path,
        } => {
            let config = load_config(&cli.config)?;
            commands::chat::run(config, message, provider, model, path).await?
        }
        Commands::Providers => commands::providers::run(load_config(&cli.config)?).await?,
        Commands::Doctor => commands::doctor::run(cli.config.as_deref()).await?,
        Commands::Validate { json } => commands::validate::run(load_config(&cli.config)?, &json)?,
    }

    Ok(())
}

fn load_config(path: &Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    Ok(config.map_err(|e| format!("Failed to load config: {e}"))?)
}
