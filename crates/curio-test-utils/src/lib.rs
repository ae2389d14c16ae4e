//! Test helpers shared across Curio crates.

pub mod agent;
pub mod fixtures;

pub use agent::{ScriptedAgent, ScriptedStep};
pub use fixtures::{DiscoveryStack, discovery_stack};
