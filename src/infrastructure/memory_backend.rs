// Memory backend - Runs tile queries through the interpreter
use crate::application::query_backend::{BackendError, QueryBackend};
use crate::domain::query_result::QueryResult;
use crate::interpreter::{self, DatasetRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::spawn_blocking;

#[derive(Clone)]
pub struct MemoryBackend {
    registry: Arc<dyn DatasetRegistry>,
}

impl MemoryBackend {
    pub fn new(registry: Arc<dyn DatasetRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl QueryBackend for MemoryBackend {
    /// Scans run on the blocking pool so a caller's deadline can still fire.
    /// A scan abandoned by its caller runs to completion and is dropped.
    async fn execute(&self, data_source_id: &str, sql: &str) -> Result<QueryResult, BackendError> {
        tracing::debug!(data_source_id, sql, "Executing in-memory query");
        let registry = Arc::clone(&self.registry);
        let (data_source_id, sql) = (data_source_id.to_string(), sql.to_string());

        let result = spawn_blocking(move || interpreter::execute(&sql, &data_source_id, registry.as_ref())).await?;
        Ok(result?)
    }
}
