//! Core streaming primitives for Curio.
//!
//! This crate owns the session store, the context validator that keeps the
//! assistant honest about product ids, the function executor, and the
//! per-session stream coordinator that turns agent output into ordered
//! wire events.

pub mod agent;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod session;

pub use agent::{AgentError, AgentStep, AgentTurn, DiscoveryAgent, MockDiscoveryAgent};
pub use context::{ContextValidator, Validation};
pub use coordinator::{Coordinators, EventBus, StreamCoordinator, StreamHandle};
pub use curio_protocol::EventSink;
pub use error::CoreError;
pub use executor::FunctionExecutor;
pub use session::{SearchHit, SearchRecord, SessionSnapshot, SessionStore};
