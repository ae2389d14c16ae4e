//! Batteries-included entry point for embedding Curio.
//!
//! Re-exports each layer of the stack under a short alias so consumers can
//! depend on one crate, plus a logging bootstrap shared by binaries.

pub use curio_catalog as catalog;
pub use curio_client as client;
pub use curio_config as config;
pub use curio_core as core;
pub use curio_protocol as protocol;

/// Wire up `env_logger` for binaries built with the "logging" feature.
///
/// Without the feature this compiles to nothing; call it first thing in
/// `main` so startup messages are not lost.
#[inline]
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
