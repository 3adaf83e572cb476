// HTTP query backend - Posts resolved queries to a remote /api/query endpoint
use crate::application::query_backend::{BackendError, QueryBackend};
use crate::domain::query_result::QueryResult;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct HttpQueryBackend {
    host: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql: &'a str,
    data_source_id: &'a str,
}

/// The endpoint either returns rows or, when no engine is attached, echoes
/// the query back with a message.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryResponse {
    Rows {
        rows: QueryResult,
    },
    Acknowledged {
        message: String,
    },
}

impl HttpQueryBackend {
    pub fn new(host: String) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_query_url(&self, data_source_id: &str) -> String {
        format!(
            "{}/api/query?dataSourceId={}",
            self.host,
            urlencoding::encode(data_source_id)
        )
    }
}

fn parse_response(body: &str) -> Result<QueryResult, BackendError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))?;

    match response {
        QueryResponse::Rows { rows } => Ok(rows),
        QueryResponse::Acknowledged { message } => {
            tracing::debug!(%message, "Query endpoint acknowledged without rows");
            Ok(QueryResult::default())
        }
    }
}

#[async_trait]
impl QueryBackend for HttpQueryBackend {
    async fn execute(&self, data_source_id: &str, sql: &str) -> Result<QueryResult, BackendError> {
        let url = self.build_query_url(data_source_id);
        tracing::debug!(%url, "Posting query");

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&QueryRequest { sql, data_source_id })
            .send()
            .await
            .context("Failed to send request to query endpoint")
            .map_err(BackendError::Transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read query response")
            .map_err(BackendError::Transport)?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }
}
