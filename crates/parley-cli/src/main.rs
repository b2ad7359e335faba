//! Parley CLI: drive the markup parser and the permission gate from a shell.
//!
//! Replies are read from a file or stdin and streamed in chunks, the way a
//! model would produce them. Approval forms are printed instead of being
//! delivered to a chat.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config_bridge;

mod commands;
mod theme;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use parley_config::{Config, LoadOptions};
use parley_telemetry::{LogConfig, LogFormat};

use crate::commands::run::RunOptions;

/// Parley: streaming markup and permission gating for agent replies.
#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file layered over the user config
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a reply and print the element events
    Parse {
        /// Reply file (stdin when omitted)
        input: Option<PathBuf>,

        /// Characters per streamed chunk (0 = whole reply)
        #[arg(long, default_value_t = 0)]
        chunk_size: usize,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Evaluate the configured rules for one request
    Check {
        /// Requester, as `kind:id` (e.g. `agent:claude`)
        subject: String,

        /// Resource, as `kind:name` (e.g. `command:ls`)
        resource: String,

        /// Session the request belongs to
        #[arg(long)]
        session: Option<String>,

        /// Owner the request acts for
        #[arg(long)]
        owner: Option<String>,
    },

    /// Stream a reply through the permission gate
    Run {
        /// Reply file (stdin when omitted)
        input: Option<PathBuf>,

        /// Who wrote the reply, as `kind:id`
        #[arg(long, default_value = "agent:assistant")]
        subject: String,

        /// Session the reply belongs to
        #[arg(long, default_value = "cli")]
        session: String,

        /// Answer every approval prompt with this (e.g. `allow_once`, `deny`);
        /// prompts time out when omitted
        #[arg(long)]
        answer: Option<String>,

        /// Characters per streamed chunk (0 = whole reply)
        #[arg(long, default_value_t = 16)]
        chunk_size: usize,

        /// Escalation timeout in seconds, overriding the config
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the resolved configuration with source annotations
    Show {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Load and validate the configuration
    Validate,
    /// Print the config file locations
    Paths,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = match &cli.config {
        Some(path) => LoadOptions::from_env().with_file(path.clone()),
        None => LoadOptions::from_env(),
    };
    let loaded = Config::load(&options);

    // Set up logging from config, with --verbose override.
    let log_config = if let Ok(resolved) = &loaded {
        let mut lc = config_bridge::to_log_config(&resolved.config);
        if cli.verbose {
            "debug".clone_into(&mut lc.level);
        }
        lc
    } else {
        let level = if cli.verbose { "debug" } else { "info" };
        LogConfig::new(level).with_format(LogFormat::Compact)
    };
    if let Err(e) = parley_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Parse {
            input,
            chunk_size,
            json,
        } => commands::parse::run_parse(input.as_deref(), chunk_size, json)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show { format } => commands::config::show_config(&options, &format)?,
            ConfigCommands::Validate => commands::config::validate_config(&options)?,
            ConfigCommands::Paths => commands::config::show_paths(&options),
        },
        Commands::Check {
            subject,
            resource,
            session,
            owner,
        } => {
            let cfg = loaded?.config;
            commands::check::run_check(&cfg, &subject, &resource, session, owner)?;
        },
        Commands::Run {
            input,
            subject,
            session,
            answer,
            chunk_size,
            timeout_secs,
        } => {
            let cfg = loaded?.config;
            let options = RunOptions {
                subject,
                session,
                answer,
                chunk_size,
                timeout: timeout_secs.map(Duration::from_secs),
            };
            commands::run::run_reply(&cfg, input.as_deref(), options).await?;
        },
    }

    Ok(())
}
