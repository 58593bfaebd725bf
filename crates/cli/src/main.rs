//! CampusPilot CLI — the main entry point.
//!
//! Commands:
//! - `replay`  — Play a recorded model transcript through the engine
//! - `init`    — Write a default config file
//! - `config`  — Show the effective configuration

use std::path::PathBuf;

use campuspilot_config::AppConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "campuspilot",
    about = "CampusPilot — college planning assistant engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted model transcript, printing events as JSON lines
    Replay {
        /// Path to the JSON script
        #[arg(short, long)]
        script: PathBuf,

        /// Re-split each turn into chunks of this many characters
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override the configured step limit
        #[arg(long)]
        step_limit: Option<u32>,

        /// Read each turn to the end before looking for tool calls
        #[arg(long)]
        end_of_stream: bool,

        /// Write the final message list to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Write a default config to ~/.campuspilot/config.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    // Initialize tracing. Stdout carries replay events, so logs go to stderr.
    let filter = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Replay {
            script,
            chunk_size,
            step_limit,
            end_of_stream,
            save,
        } => {
            let args = commands::replay::ReplayArgs {
                script,
                chunk_size,
                step_limit,
                end_of_stream,
                save,
            };
            commands::replay::run(&config, args).await?
        }
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Config => commands::config_cmd::show(&config).await?,
    }

    Ok(())
}
