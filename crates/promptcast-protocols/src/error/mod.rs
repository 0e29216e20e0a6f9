//! Error types shared across promptcast crates.

mod bridge;
mod tab;
mod widget;

pub use bridge::BridgeError;
pub use tab::TabError;
pub use widget::WidgetError;
