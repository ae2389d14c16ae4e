//! Wired-up collaborator stacks for integration tests.

use curio_catalog::{CartStore, CatalogStore, InMemoryCart, InMemoryCatalog, demo_catalog};
use curio_config::CurioConfig;
use curio_core::context::ContextValidator;
use curio_core::executor::FunctionExecutor;
use curio_core::session::SessionStore;
use std::sync::Arc;

/// Executor plus every collaborator behind it, seeded with the demo catalog.
pub struct DiscoveryStack {
    pub sessions: SessionStore,
    pub validator: Arc<ContextValidator>,
    pub executor: Arc<FunctionExecutor>,
    pub catalog: Arc<InMemoryCatalog>,
    pub cart: Arc<InMemoryCart>,
}

/// Build the full validator/executor stack from a config.
pub fn discovery_stack(config: &CurioConfig) -> DiscoveryStack {
    let sessions = SessionStore::new(&config.sessions);
    let catalog = Arc::new(InMemoryCatalog::new(demo_catalog()));
    let cart = Arc::new(InMemoryCart::new());
    let validator = Arc::new(ContextValidator::new(sessions.clone(), &config.context));
    let executor = Arc::new(FunctionExecutor::new(
        sessions.clone(),
        validator.clone(),
        catalog.clone() as Arc<dyn CatalogStore>,
        cart.clone() as Arc<dyn CartStore>,
    ));
    DiscoveryStack {
        sessions,
        validator,
        executor,
        catalog,
        cart,
    }
}
