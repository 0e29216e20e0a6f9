//! promptcast - multi-provider prompt broadcaster
//!
//! Main entry point for the promptcast CLI and server.

mod api;
mod cli;
mod cmd_config;
mod cmd_send;
mod server;

use std::time::Duration;

use clap::Parser;

use promptcast_config::ConfigLoader;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    server::init_tracing()?;

    let cli = Cli::parse();
    let config_path = cli
        .config
        .as_ref()
        .map(|p| std::path::PathBuf::from(ConfigLoader::expand_path(&p.to_string_lossy())));
    let mut config = ConfigLoader::load_or_default(config_path.as_deref())?;

    match cli.command {
        None => server::run_server(config).await,
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::run_server(config).await
        }
        Some(Commands::Send {
            prompt,
            providers,
            auto_send,
            follow_up,
            linger_ms,
        }) => {
            cmd_send::send(
                config,
                prompt,
                providers,
                auto_send,
                follow_up,
                Duration::from_millis(linger_ms),
            )
            .await
        }
        Some(Commands::Providers { format }) => cmd_send::providers(&config, &format),
        Some(Commands::Config { action }) => {
            cmd_config::handle_config_command(action, config_path.as_deref(), &config)
        }
    }
}
