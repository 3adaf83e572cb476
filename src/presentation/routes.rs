// Router - Route table for the dashboard API
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    api_health, apply_filters, execute_query, get_dashboard, health_check, list_dashboards, list_datasets,
    refresh_dashboard, refresh_tile, reset_filters, stream_dashboard,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Compression is applied in the response builders, so there is no
// CompressionLayer here.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/health", get(api_health))
        .route("/api/datasets", get(list_datasets))
        .route("/api/query", post(execute_query))
        .route("/dashboards", get(list_dashboards))
        .route("/dashboards/:id", get(get_dashboard))
        .route("/dashboards/:id/filters", put(apply_filters).delete(reset_filters))
        .route("/dashboards/:id/refresh", post(refresh_dashboard))
        .route("/dashboards/:id/tiles/:tile_id/refresh", post(refresh_tile))
        .route("/dashboards/:id/stream", get(stream_dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
