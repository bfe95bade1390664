use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{conversions, engine, handlers, middleware::metrics_middleware, service};
use crate::state::AppState;

/// Upload limit for `POST /conversions`
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Conversion service health
        .route(
            "/service/health",
            get(service::get_service_health).post(service::check_service_health),
        )
        // Conversions
        .route(
            "/conversions",
            get(conversions::get_conversions).post(conversions::start_conversions),
        )
        .route("/conversions/cancel", post(conversions::cancel_conversions))
        .route("/conversions/reset", post(conversions::reset_conversions))
        // Local engine
        .route("/engine", get(engine::get_engine))
        .route("/engine/load", post(engine::load_engine))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
