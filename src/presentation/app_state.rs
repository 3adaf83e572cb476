// Application state for HTTP handlers
use crate::application::dashboard_service::DashboardService;
use crate::application::query_backend::QueryBackend;
use crate::application::streaming_service::StreamingDashboardService;
use crate::infrastructure::memory_registry::InMemoryRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub dashboard_service: DashboardService,
    pub streaming_service: StreamingDashboardService,
    /// Serves ad-hoc `/api/query` requests.
    pub query_backend: Arc<dyn QueryBackend>,
    pub registry: Arc<InMemoryRegistry>,
}
