//! Common data types.

mod instruction;
mod provider;
mod tab;

pub use instruction::{BroadcastRequest, FillInstruction, InjectionOutcome};
pub use provider::{CapabilityClass, Provider};
pub use tab::{TabEvent, TabId, TabInfo, TabStatus};
