//! One-shot commands: `send` and `providers`.

use std::time::Duration;

use tracing::{info, warn};

use promptcast_config::Config;
use promptcast_core::{BroadcastReport, ProviderCatalog};
use promptcast_protocols::BroadcastRequest;

use crate::server::Host;

/// Broadcast one prompt and wait for the pages to finish with it.
pub(crate) async fn send(
    config: Config,
    prompt: String,
    provider_ids: Vec<String>,
    auto_send: bool,
    follow_up: bool,
    linger: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    if prompt.trim().is_empty() {
        return Err("prompt is empty".into());
    }

    let catalog = ProviderCatalog::from_config(&config);
    let providers = if provider_ids.is_empty() {
        catalog.enabled()
    } else {
        let (selected, unknown) = catalog.select(&provider_ids);
        if !unknown.is_empty() {
            return Err(format!("unknown provider(s): {}", unknown.join(", ")).into());
        }
        selected
    };
    if providers.is_empty() {
        return Err("no providers selected; check [providers] in the configuration".into());
    }

    let host = Host::start(&config).await?;
    let request = BroadcastRequest::new(prompt, providers, auto_send, follow_up);
    let report = host.orchestrator.broadcast(request).await;
    print_report(&report);

    host.agents.settle().await;
    // Native-context fills and send reports arrive after the agents return.
    tokio::time::sleep(linger).await;
    host.orchestrator.settle().await;

    let dispatched = report.dispatched();
    host.shutdown().await;
    if dispatched == 0 {
        return Err("no provider received the prompt".into());
    }
    info!("Done");
    Ok(())
}

fn print_report(report: &BroadcastReport) {
    println!("{:<12} {:<20} {:<10} {}", "PROVIDER", "TAB", "MODE", "STATUS");
    println!("{}", "-".repeat(60));
    for dispatch in &report.dispatches {
        let tab = dispatch.tab_id.as_ref().map(|t| t.as_str()).unwrap_or("-");
        let mode = match dispatch.mode {
            Some(promptcast_core::DispatchMode::Reused) => "reused",
            Some(promptcast_core::DispatchMode::Created) => "created",
            None => "-",
        };
        let status = match &dispatch.error {
            Some(error) => {
                warn!("{} failed: {}", dispatch.provider_id, error);
                format!("failed: {}", error)
            }
            None => "dispatched".to_string(),
        };
        println!("{:<12} {:<20} {:<10} {}", dispatch.provider_id, tab, mode, status);
    }
}

/// List the provider catalog after configuration overrides.
pub(crate) fn providers(config: &Config, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = ProviderCatalog::from_config(config);

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(catalog.entries())?;
            println!("{}", json);
        }
        _ => {
            println!(
                "{:<10} {:<10} {:<20} {:<8} {:<10} {}",
                "ID", "NAME", "DOMAIN", "ENABLED", "AUTO_SEND", "URL"
            );
            println!("{}", "-".repeat(90));
            for entry in catalog.entries() {
                let auto_send = match entry.auto_send {
                    Some(true) => "on",
                    Some(false) => "off",
                    None => "request",
                };
                println!(
                    "{:<10} {:<10} {:<20} {:<8} {:<10} {}",
                    entry.provider.id,
                    entry.provider.name,
                    entry.provider.canonical_domain,
                    entry.enabled,
                    auto_send,
                    entry.provider.url
                );
            }
        }
    }

    Ok(())
}
