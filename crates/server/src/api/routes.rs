use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, upload};
use super::middleware::{metrics_middleware, request_log_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config().upload.max_body_bytes;
    let request_timeout = Duration::from_secs(state.config().server.request_timeout_secs);

    // API routes
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config));

    Router::new()
        // Upload path is fixed by deployed clients, so it stays outside /api/v1
        .route(
            "/upload-logs",
            post(upload::upload_logs).layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_log_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}
