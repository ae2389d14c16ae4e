//! Configuration models and file loading for Curio.
//!
//! This crate owns the config schema and validation used by the server
//! binary and by embedding consumers.

mod error;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Configuration schema models.
pub use model::*;
