//! Chrome host for promptcast.
//!
//! Drives a real Chrome through the DevTools Protocol: tabs are CDP page
//! targets, the page agent runs in an isolated world named `promptcast`, and
//! the native companion runs in the page's own world.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐    WebSocket     ┌──────────────────┐
//! │ TabOrchestrator  │ ◄──────────────► │   Chrome/Edge    │
//! │  CdpTabs         │       CDP        │  (user's browser)│
//! │  AgentHost       │                  │                  │
//! └──────────────────┘                  └──────────────────┘
//! ```
//!
//! ## Setup
//!
//! Either let promptcast launch Chrome (`browser.launch = true`) or start it
//! yourself with remote debugging enabled:
//!
//! ```bash
//! google-chrome --remote-debugging-port=9222
//! ```
//!
//! Attaching to an existing browser keeps the provider logins it already has.

pub mod cdp;
mod channel;
mod host;
pub mod manager;
mod page;
mod scripts;
mod tabs;

pub use cdp::{CdpClient, CdpError, PageSession};
pub use channel::CdpWindowChannel;
pub use host::{AgentHost, Uplink};
pub use manager::{BrowserError, BrowserManager, BrowserManagerConfig};
pub use page::{CdpPage, PageContext, World};
pub use tabs::CdpTabs;
