//! # parley
//!
//! Command-line client for the parley chat sync engine.
//!
//! ## Commands
//!
//! - `init`: Write a starter config file
//! - `listen`: Stay connected and print chat events
//! - `send`: Send a text or file message to a dialog
//! - `presence`: Announce online/offline presence
//! - `destroy-session`: Terminate one of your sessions
//! - `config`: Print the effective configuration
//!
//! ## Example
//!
//! ```bash
//! # Point the client at a server
//! parley init --server wss://chat.example.com/ws --user u-42 --session s-1
//!
//! # Watch incoming messages
//! parley listen
//!
//! # Send a message
//! parley send --dialog d-7 "Hello!"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{init, listen, presence, send, session, show_config};

/// Command-line client for the parley chat sync engine.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter config file
    Init {
        /// WebSocket URL of the chat server
        #[arg(long)]
        server: String,

        /// Your user id
        #[arg(long)]
        user: String,

        /// Your session id
        #[arg(long)]
        session: Option<String>,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Stay connected and print chat events until Ctrl-C
    Listen,

    /// Send a message to a dialog
    Send {
        /// Target dialog id
        #[arg(long, short)]
        dialog: String,

        /// Message text (or use --file)
        text: Option<String>,

        /// File to send
        #[arg(long, short, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Announce online/offline presence
    Presence {
        /// New presence
        #[arg(value_enum)]
        status: PresenceStatus,
    },

    /// Terminate one of your sessions
    DestroySession {
        /// Session id to terminate
        session_id: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PresenceStatus {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = config::resolve_path(cli.config)?;

    if let Commands::Init {
        server,
        user,
        session,
        force,
    } = &cli.command
    {
        return init::run(&config_path, server, user, session.as_deref(), *force).await;
    }

    let client_config = config::load(&config_path).await?;
    tracing::debug!("Loaded config from {}", config_path.display());

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Listen => {
            listen::run(client_config).await?;
        }
        Commands::Send { dialog, text, file } => {
            let payload = if let Some(text) = text {
                send::Payload::Text(text)
            } else if let Some(path) = file {
                send::Payload::File(path)
            } else {
                anyhow::bail!("Must specify message text or --file");
            };
            send::run(client_config, &dialog, payload).await?;
        }
        Commands::Presence { status } => {
            presence::run(client_config, status == PresenceStatus::On).await?;
        }
        Commands::DestroySession { session_id } => {
            session::destroy(client_config, &session_id).await?;
        }
        Commands::Config => {
            show_config::run(&config_path, &client_config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_send_text() {
        let cli = Cli::parse_from(["parley", "send", "--dialog", "d-1", "hello"]);
        match cli.command {
            Commands::Send { dialog, text, file } => {
                assert_eq!(dialog, "d-1");
                assert_eq!(text.as_deref(), Some("hello"));
                assert!(file.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn send_text_and_file_conflict() {
        let result =
            Cli::try_parse_from(["parley", "send", "-d", "d-1", "hello", "--file", "a.png"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_presence_and_global_config() {
        let cli = Cli::parse_from(["parley", "presence", "off", "--config", "/tmp/p.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(
            cli.command,
            Commands::Presence {
                status: PresenceStatus::Off
            }
        ));
    }

    #[test]
    fn parse_destroy_session() {
        let cli = Cli::parse_from(["parley", "destroy-session", "s-9"]);
        assert!(matches!(
            cli.command,
            Commands::DestroySession { session_id } if session_id == "s-9"
        ));
    }
}
