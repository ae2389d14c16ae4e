//! HTTP server for Curio: session lifecycle, message submission, the SSE
//! event stream, and direct function endpoints.

mod rate_limit;
mod routes;

pub use rate_limit::{LimitScope, RateLimiter};

use chrono::{DateTime, Utc};
use curio_catalog::{CartStore, CatalogStore, InMemoryCart, InMemoryCatalog, demo_catalog};
use curio_config::CurioConfig;
use curio_core::agent::DiscoveryAgent;
use curio_core::context::ContextValidator;
use curio_core::coordinator::Coordinators;
use curio_core::executor::FunctionExecutor;
use curio_core::session::SessionStore;
use log::info;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use std::sync::Arc;
use std::time::Duration;

/// Shared state handed to every route.
pub struct AppState {
    /// Effective configuration.
    pub config: CurioConfig,
    /// Keyed session store.
    pub sessions: SessionStore,
    /// Per-session stream coordinators.
    pub coordinators: Coordinators,
    /// Function executor over the collaborators.
    pub executor: Arc<FunctionExecutor>,
    /// Cart collaborator, exposed for the cart endpoints.
    pub cart: Arc<dyn CartStore>,
    /// Sliding-window rate limiter.
    pub limiter: RateLimiter,
    /// Server start time for the health endpoint.
    pub started_at: DateTime<Utc>,
}

/// Assemble the Rocket application around an agent implementation.
pub fn build(config: CurioConfig, agent: Arc<dyn DiscoveryAgent>) -> Rocket<Build> {
    let sessions = SessionStore::new(&config.sessions);
    let products = if config.catalog.seed_demo_data {
        demo_catalog()
    } else {
        Vec::new()
    };
    info!("catalog seeded (products={})", products.len());
    let catalog: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalog::new(products));
    let cart: Arc<dyn CartStore> = Arc::new(InMemoryCart::new());
    let validator = Arc::new(ContextValidator::new(sessions.clone(), &config.context));
    let executor = Arc::new(FunctionExecutor::new(
        sessions.clone(),
        validator,
        catalog,
        cart.clone(),
    ));
    let coordinators = Coordinators::new(
        sessions.clone(),
        agent,
        executor.clone(),
        config.stream.event_buffer,
    );
    let limiter = RateLimiter::new(&config.rate_limits);
    let sweep_interval = Duration::from_secs(config.sessions.sweep_interval_secs);

    let figment = rocket::Config::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port));

    rocket::custom(figment)
        .manage(AppState {
            config,
            sessions,
            coordinators,
            executor,
            cart,
            limiter,
            started_at: Utc::now(),
        })
        .attach(AdHoc::on_liftoff("session-sweeper", move |rocket| {
            Box::pin(async move {
                if let Some(state) = rocket.state::<AppState>() {
                    state.sessions.spawn_sweeper(sweep_interval);
                    info!(
                        "session sweeper started (interval_secs={})",
                        sweep_interval.as_secs()
                    );
                }
            })
        }))
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::create_session,
                routes::session_context,
                routes::send_message,
                routes::stream_chat,
                routes::search_products,
                routes::show_product_details,
                routes::add_to_cart,
                routes::get_recommendations,
                routes::cart_summary,
                routes::clear_cart,
            ],
        )
}
