//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    /// Per-provider overrides keyed by provider id (`chatgpt`, `claude`, ...).
    #[serde(default)]
    pub providers: HashMap<String, ProviderOverride>,
}

impl Config {
    /// Override entry for a provider, if configured.
    pub fn provider(&self, id: &str) -> Option<&ProviderOverride> {
        self.providers.get(id)
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8733
}

/// Browser connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Remote debugging port of the browser to connect to (or launch with).
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Launch a browser when none is listening on `debug_port`.
    #[serde(default = "default_true")]
    pub launch: bool,

    #[serde(default)]
    pub headless: bool,

    /// Profile directory for a launched browser. Keeps provider logins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            debug_port: default_debug_port(),
            launch: true,
            headless: false,
            profile_dir: None,
            chrome_path: None,
        }
    }
}

impl BrowserConfig {
    /// Profile directory with `~` expanded, falling back to `~/.promptcast/profile`.
    pub fn resolved_profile_dir(&self) -> PathBuf {
        match &self.profile_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => promptcast_dir().join("profile"),
        }
    }
}

fn default_debug_port() -> u16 {
    9222
}

fn default_true() -> bool {
    true
}

/// Timing knobs. Every wait in the system is bounded by one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Upper bound on waiting for a text-entry widget to appear.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_ms: u64,

    /// Upper bound on waiting for a freshly created tab to finish loading.
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_ms: u64,

    /// Upper bound on the page-side `document.readyState` wait.
    #[serde(default = "default_ready_state_timeout")]
    pub ready_state_timeout_ms: u64,

    /// Pause between focusing a widget and writing to it.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Pause after a synthetic paste before verifying.
    #[serde(default = "default_paste_settle")]
    pub paste_settle_ms: u64,

    /// Pause after a successful fill for the page framework to re-render.
    #[serde(default = "default_render_settle")]
    pub render_settle_ms: u64,

    /// Pause before looking for a send affordance.
    #[serde(default = "default_submit_initial_delay")]
    pub submit_initial_delay_ms: u64,

    #[serde(default = "default_submit_poll_interval")]
    pub submit_poll_interval_ms: u64,

    #[serde(default = "default_submit_poll_attempts")]
    pub submit_poll_attempts: u32,

    /// Delay between per-character keystrokes.
    #[serde(default = "default_keystroke_delay")]
    pub keystroke_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: default_discovery_timeout(),
            page_load_timeout_ms: default_page_load_timeout(),
            ready_state_timeout_ms: default_ready_state_timeout(),
            settle_delay_ms: default_settle_delay(),
            paste_settle_ms: default_paste_settle(),
            render_settle_ms: default_render_settle(),
            submit_initial_delay_ms: default_submit_initial_delay(),
            submit_poll_interval_ms: default_submit_poll_interval(),
            submit_poll_attempts: default_submit_poll_attempts(),
            keystroke_delay_ms: default_keystroke_delay(),
        }
    }
}

impl TimingConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    pub fn ready_state_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_state_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }

    pub fn submit_initial_delay(&self) -> Duration {
        Duration::from_millis(self.submit_initial_delay_ms)
    }

    pub fn submit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.submit_poll_interval_ms)
    }

    pub fn keystroke_delay(&self) -> Duration {
        Duration::from_millis(self.keystroke_delay_ms)
    }
}

fn default_discovery_timeout() -> u64 {
    15_000
}

fn default_page_load_timeout() -> u64 {
    30_000
}

fn default_ready_state_timeout() -> u64 {
    10_000
}

fn default_settle_delay() -> u64 {
    50
}

fn default_paste_settle() -> u64 {
    100
}

fn default_render_settle() -> u64 {
    150
}

fn default_submit_initial_delay() -> u64 {
    400
}

fn default_submit_poll_interval() -> u64 {
    100
}

fn default_submit_poll_attempts() -> u32 {
    10
}

fn default_keystroke_delay() -> u64 {
    5
}

/// Per-provider preference override. Unset fields keep the catalog value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_send: Option<bool>,

    /// Allow the component change-handler fill strategy for this provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_handler: Option<bool>,
}

/// promptcast home directory (`~/.promptcast`).
pub fn promptcast_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".promptcast")
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    promptcast_dir().join("config.toml")
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
