//! # promptcast Protocols
//!
//! Protocol definitions shared by every promptcast crate.
//! Contains only interface definitions and plain data - no implementations.
//!
//! ## Core Traits
//!
//! - [`TabBrowser`] - Tab lifecycle and message delivery, as seen by the orchestrator
//! - [`PageSurface`] - One execution context of a loaded page
//! - [`Widget`] - A located text-entry element inside a page
//! - [`Control`] - A clickable send affordance

pub mod error;
pub mod message;
pub mod page;
pub mod tabs;
pub mod types;

pub use error::{BridgeError, TabError, WidgetError};
pub use message::{MessageAck, RuntimeMessage};
pub use page::{Control, MutationFeed, PageSurface, SyntheticEvent, Widget, WidgetKind};
pub use tabs::TabBrowser;
pub use types::*;
