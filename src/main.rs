// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod interpreter;
mod presentation;
#[cfg(test)]
mod test_support;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::prelude::*;

use crate::application::dashboard_service::DashboardService;
use crate::application::query_backend::QueryBackend;
use crate::application::streaming_service::StreamingDashboardService;
use crate::infrastructure::config::{load_dashboards_config, load_datasets_config, load_server_config, BackendKind};
use crate::infrastructure::http_backend::HttpQueryBackend;
use crate::infrastructure::memory_backend::MemoryBackend;
use crate::presentation::app_state::AppState;
use crate::presentation::routes::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let server_config = load_server_config()?;
    let dashboards_config = load_dashboards_config()?;
    let registry = Arc::new(load_datasets_config()?.into_registry()?);

    // Create backends (infrastructure layer)
    let memory_backend: Arc<dyn QueryBackend> = Arc::new(MemoryBackend::new(registry.clone()));
    let tile_backend: Arc<dyn QueryBackend> = match (server_config.backend.kind, &server_config.backend.host) {
        (BackendKind::Http, Some(host)) => {
            tracing::info!(%host, "Tiles query the remote endpoint");
            Arc::new(HttpQueryBackend::new(host.clone()))
        }
        _ => memory_backend.clone(),
    };

    // Create services (application layer); sessions mount immediately
    let dashboard_service = DashboardService::start(
        dashboards_config.dashboards,
        dashboards_config.data_sources,
        tile_backend,
        server_config.pipeline.settings(),
    );
    let streaming_service = StreamingDashboardService::new(dashboard_service.clone());

    let state = Arc::new(AppState {
        dashboard_service,
        streaming_service,
        query_backend: memory_backend,
        registry,
    });

    // Start server
    let addr: SocketAddr = server_config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", server_config.server.bind))?;
    tracing::info!("Starting dashboard-tiles service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state)).await?;

    Ok(())
}
