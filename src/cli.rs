//! CLI definitions for promptcast.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// promptcast CLI.
#[derive(Parser)]
#[command(name = "promptcast")]
#[command(about = "Broadcast one prompt to several AI chat front-ends at once")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.promptcast/config.toml if present)
    #[arg(short, long, global = true, env = "PROMPTCAST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Connect to Chrome and serve the message API (default)
    Serve {
        /// Server host (overrides [server].host)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides [server].port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Broadcast a prompt once and exit
    Send {
        /// Prompt text
        prompt: String,

        /// Provider id to target; repeatable (default: every enabled provider)
        #[arg(short, long = "provider")]
        providers: Vec<String>,

        /// Submit after filling
        #[arg(long)]
        auto_send: bool,

        /// Reuse the provider's open tab instead of opening a new one
        #[arg(long)]
        follow_up: bool,

        /// How long to keep the browser session open after dispatch, in ms
        #[arg(long, default_value_t = 3000)]
        linger_ms: u64,
    },

    /// List known providers after configuration overrides
    Providers {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Load and validate the configuration
    Check,

    /// Print the effective configuration as TOML
    Show,
}
