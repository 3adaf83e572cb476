// Query backend trait - Where resolved tile queries are submitted
use crate::domain::query_result::QueryResult;
use crate::interpreter::QueryError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("query endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("query request failed: {0:#}")]
    Transport(anyhow::Error),

    #[error("unexpected query response: {0}")]
    Decode(String),

    #[error("query task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Run resolved query text against one data source.
    async fn execute(&self, data_source_id: &str, sql: &str) -> Result<QueryResult, BackendError>;
}
