//! Chrome DevTools Protocol (CDP) client.
//!
//! One WebSocket to the browser endpoint carries browser-level commands and,
//! through flat sessions, every tab's commands and events.
//!
//! ```rust,ignore
//! let client = CdpClient::connect("http://localhost:9222").await?;
//! let target = client.create_target("https://chatgpt.com/").await?;
//! let session = client.attach(&target).await?;
//! let state = session.evaluate("document.readyState", None).await?;
//! ```

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::PageSession;

#[cfg(test)]
pub(crate) use client::Transport;
