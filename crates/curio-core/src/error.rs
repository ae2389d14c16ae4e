//! Error types for the core crate.

use curio_protocol::SessionId;
use thiserror::Error;

/// Errors returned by session, coordinator, and executor operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Session id was never created or has been swept away.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
    /// Session exists but is past its expiry window.
    #[error("session expired: {0}")]
    SessionExpired(SessionId),
    /// A turn is already streaming for the session.
    #[error("turn already in progress for session: {0}")]
    TurnInProgress(SessionId),
    /// Agent seam failure.
    #[error("agent error: {0}")]
    Agent(String),
    /// Catalog or cart collaborator failure.
    #[error("catalog error: {0}")]
    Catalog(#[from] curio_catalog::CatalogError),
}
