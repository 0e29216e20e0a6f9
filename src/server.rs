//! Server initialization and startup logic for promptcast.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use promptcast_browser_cdp::{AgentHost, BrowserManager, BrowserManagerConfig, CdpTabs};
use promptcast_config::{promptcast_dir, Config};
use promptcast_core::{OrchestratorConfig, ProviderCatalog, TabOrchestrator};
use promptcast_inject::ProfileBook;
use promptcast_protocols::{RuntimeMessage, TabBrowser, TabId};

use crate::api::create_router;

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.promptcast/logs/ with daily rotation.
pub(crate) fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = promptcast_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("promptcast")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer flushes until the guard drops.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        // Console layer
        .with(fmt::layer().with_target(true).with_ansi(true))
        // File layer
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// A connected browser with the orchestrator running on top of it.
pub(crate) struct Host {
    pub orchestrator: Arc<TabOrchestrator>,
    pub agents: Arc<AgentHost>,
    manager: BrowserManager,
    tasks: Vec<JoinHandle<()>>,
}

impl Host {
    /// Connect to (or launch) Chrome and wire tabs, page agents and the
    /// orchestrator together.
    pub async fn start(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let manager = BrowserManager::new(BrowserManagerConfig::from_config(&config.browser));
        let client = manager.connect().await?;
        info!("Connected to browser at {}", client.http_endpoint());

        let catalog = ProviderCatalog::from_config(config);
        let (uplink, mut inbox) = mpsc::unbounded_channel::<(TabId, RuntimeMessage)>();
        let agents = Arc::new(AgentHost::new(
            ProfileBook::from_catalog(&catalog),
            &config.timing,
            uplink,
        ));

        let tabs = CdpTabs::start(client, agents.clone()).await?;
        let events = tabs.subscribe();
        let browser: Arc<dyn TabBrowser> = tabs;
        let orchestrator = Arc::new(TabOrchestrator::new(
            browser,
            catalog,
            OrchestratorConfig::from_timing(&config.timing),
        ));

        let mut tasks = vec![tokio::spawn(orchestrator.clone().run(events))];

        // Page → orchestrator traffic.
        let receiver = orchestrator.clone();
        tasks.push(tokio::spawn(async move {
            while let Some((tab_id, message)) = inbox.recv().await {
                debug!("{} from tab {}", message.kind(), tab_id);
                receiver.handle_message(message, Some(tab_id));
            }
        }));

        Ok(Self {
            orchestrator,
            agents,
            manager,
            tasks,
        })
    }

    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        self.manager.shutdown().await;
    }
}

/// Run the server in foreground.
pub(crate) async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let host_addr = config.server.host.clone();
    let port = config.server.port;

    info!("Starting promptcast v{}", env!("CARGO_PKG_VERSION"));

    let host = Host::start(&config).await?;
    let app = create_router(host.orchestrator.clone());

    info!("promptcast ready:");
    info!("  API Server:    http://{}:{}", host_addr, port);
    info!("");
    info!("API Endpoints:");
    info!("  POST /api/messages   - runtime message (OPEN_AI_PROVIDERS, ...)");
    info!("  GET  /api/tabs       - provider tab registry");
    info!("  GET  /health         - health check");

    let addr: std::net::SocketAddr = format!("{}:{}", host_addr, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Interface server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down...");
    host.shutdown().await;
    Ok(())
}
