//! # promptcast Core
//!
//! The controller side of promptcast: maps providers to browser tabs,
//! decides between reusing and creating a tab, and relays fill instructions.
//!
//! - [`classifier`] - URL to canonical provider domain
//! - [`registry`] - which tab currently represents which provider
//! - [`catalog`] - known providers and their preferences
//! - [`orchestrator`] - per-broadcast tab resolution and delivery

pub mod catalog;
pub mod classifier;
pub mod orchestrator;
pub mod registry;

#[cfg(test)]
mod testing;

pub use catalog::{CatalogEntry, ProviderCatalog};
pub use classifier::{classify, DomainKey};
pub use orchestrator::{
    BroadcastReport, DispatchMode, OrchestratorConfig, ProviderDispatch, TabOrchestrator,
};
pub use registry::{TabRecord, TabRegistry};
