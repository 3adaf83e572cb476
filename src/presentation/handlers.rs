// HTTP request handlers
use crate::application::dashboard_service::{DashboardSession, TileStatus};
use crate::domain::dashboard::Dashboard;
use crate::domain::data_source::ColumnMapping;
use crate::domain::filter::FilterValues;
use crate::domain::layout::GridLayout;
use crate::domain::query_result::QueryResult;
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use crate::presentation::errors::ApiError;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_DATA_SOURCE: &str = "default";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub sql: String,
    pub data_source_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub rows: QueryResult,
}

#[derive(Debug, Serialize)]
pub struct DatasetInfo<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub endpoint: &'a str,
    pub column_mappings: &'a [ColumnMapping],
    pub tables: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct DatasetsResponse<'a> {
    pub datasets: Vec<DatasetInfo<'a>>,
}

#[derive(Debug, Serialize)]
pub struct DashboardView<'a> {
    pub dashboard: &'a Dashboard,
    pub layout: GridLayout,
    pub filter_values: FilterValues,
    pub tiles: Vec<TileStatus>,
}

#[derive(Debug, Serialize)]
pub struct TriggeredResponse {
    pub triggered: Vec<String>,
    pub filter_values: FilterValues,
}

fn session(state: &AppState, id: &str) -> Result<Arc<DashboardSession>, ApiError> {
    state
        .dashboard_service
        .session(id)
        .ok_or_else(|| ApiError::DashboardNotFound(id.to_string()))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Configured data sources with their column mappings and loaded tables
pub async fn list_datasets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let datasets = state
        .dashboard_service
        .data_sources()
        .iter()
        .map(|ds| DatasetInfo {
            id: &ds.id,
            name: &ds.name,
            endpoint: &ds.endpoint,
            column_mappings: &ds.column_mappings,
            tables: state.registry.table_names(&ds.id),
        })
        .collect();

    Json(DatasetsResponse { datasets }).into_response()
}

/// Run an ad-hoc query
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let data_source_id = request.data_source_id.unwrap_or_else(|| {
        state
            .dashboard_service
            .data_sources()
            .first()
            .map_or_else(|| DEFAULT_DATA_SOURCE.to_string(), |ds| ds.id.clone())
    });

    let rows = state.query_backend.execute(&data_source_id, &request.sql).await?;
    Ok(Json(QueryResponse { rows }))
}

pub async fn list_dashboards(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard_service.list())
}

/// Dashboard definition, layout, active filters and tile states
pub async fn get_dashboard(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(&state, &id)?;
    let view = DashboardView {
        dashboard: session.dashboard(),
        layout: session.layout(),
        filter_values: session.filter_values(),
        tiles: session.snapshot(),
    };

    Ok(json_response(&view, accepts_brotli(&headers)).await?)
}

pub async fn apply_filters(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(values): Json<FilterValues>,
) -> Result<Json<TriggeredResponse>, ApiError> {
    let session = session(&state, &id)?;
    let triggered = session.apply_filters(values)?;
    Ok(Json(TriggeredResponse {
        triggered,
        filter_values: session.filter_values(),
    }))
}

pub async fn reset_filters(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<TriggeredResponse>, ApiError> {
    let session = session(&state, &id)?;
    let triggered = session.reset_filters();
    Ok(Json(TriggeredResponse {
        triggered,
        filter_values: session.filter_values(),
    }))
}

pub async fn refresh_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    session(&state, &id)?.refresh();
    Ok(StatusCode::ACCEPTED)
}

pub async fn refresh_tile(
    Path((id, tile_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    if session(&state, &id)?.refresh_tile(&tile_id) {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::TileNotFound(tile_id))
    }
}

/// Stream dashboard tile states (progressive loading)
pub async fn stream_dashboard(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rx = state
        .streaming_service
        .stream_dashboard(&id)
        .ok_or(ApiError::DashboardNotFound(id))?;

    Ok(stream_from_receiver(rx, accepts_brotli(&headers)))
}
