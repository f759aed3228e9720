//! HTTP surface of the order engine.
//!
//! Orders, the product catalog and the signed payment webhook, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod signature;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health::<S>))
        .route(
            "/products",
            post(routes::products::register::<S>).get(routes::products::search::<S>),
        )
        .route("/products/{slug}", get(routes::products::get::<S>))
        .route(
            "/products/{slug}/pricing",
            put(routes::products::update_pricing::<S>),
        )
        .route("/products/{slug}/active", put(routes::products::set_active::<S>))
        .route("/products/{slug}/restock", post(routes::products::restock::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::search::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/payment",
            post(routes::orders::initiate_payment::<S>),
        )
        .route("/orders/{id}/status", post(routes::orders::change_status::<S>))
        .route("/webhooks/payments", post(routes::webhooks::payments::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Default state: sandbox payments, log-only notifications, empty catalog.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState::with_defaults(event_store, config))
}
