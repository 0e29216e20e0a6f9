//! # promptcast Inject
//!
//! Everything that runs against a loaded provider page: locating the
//! text-entry widget, filling it through an ordered cascade of strategies,
//! optionally submitting, and relaying between the isolated and native
//! execution contexts.

pub mod agent;
pub mod bridge;
pub mod discovery;
pub mod engine;
pub mod profile;
pub mod strategy;
pub mod submit;
pub mod wait;

#[cfg(test)]
mod testing;

pub use agent::{PageAgent, PageFiller, RuntimePort};
pub use bridge::{BridgeChannel, BridgeMessage, Envelope, ExtensionRelay, NativeCompanion, BRIDGE_SOURCE};
pub use discovery::ElementDiscovery;
pub use engine::{FillEngine, FillOutcome};
pub use profile::{ExecutionContext, ProfileBook, ProviderProfile};
pub use strategy::{FillContext, FillStrategy};
pub use submit::SubmissionTrigger;
