// Tile data pipeline - Per-tile resolve and execute cycles with stale-result discard
use crate::application::parameter_resolver::{ParameterResolver, ResolutionError, UnresolvedPolicy};
use crate::application::query_backend::{BackendError, QueryBackend};
use crate::domain::filter::FilterValues;
use crate::domain::query_result::QueryResult;
use crate::domain::tile::Tile;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a tile re-entered `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Mount,
    FilterChange,
    Refresh,
    Interval,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TileState {
    #[default]
    Idle,
    Loading,
    Ready {
        rows: QueryResult,
    },
    /// Previously displayed rows are dropped on failure.
    Error {
        message: String,
    },
}

impl TileState {
    #[cfg(test)]
    pub fn is_settled(&self) -> bool {
        matches!(self, TileState::Ready { .. } | TileState::Error { .. })
    }
}

/// Displayed state plus the generation of the cycle that produced it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TileSnapshot {
    pub generation: u64,
    #[serde(flatten)]
    pub state: TileState,
}

#[derive(Debug, Error)]
pub enum TileError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub execution_timeout: Duration,
    pub unresolved: UnresolvedPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
            unresolved: UnresolvedPolicy::default(),
        }
    }
}

/// Owns one tile's state. Clones share the same state channel.
#[derive(Clone)]
pub struct TilePipeline {
    tile: Arc<Tile>,
    backend: Arc<dyn QueryBackend>,
    resolver: ParameterResolver,
    budget: Duration,
    state: Arc<watch::Sender<TileSnapshot>>,
}

impl TilePipeline {
    pub fn new(tile: Tile, backend: Arc<dyn QueryBackend>, settings: PipelineSettings) -> Self {
        let (state, _) = watch::channel(TileSnapshot::default());
        Self {
            tile: Arc::new(tile),
            backend,
            resolver: ParameterResolver::new(settings.unresolved),
            budget: settings.execution_timeout,
            state: Arc::new(state),
        }
    }

    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    pub fn snapshot(&self) -> TileSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TileSnapshot> {
        self.state.subscribe()
    }

    /// Moves the tile to `Loading` under a new generation and starts a cycle
    /// with `values`, which must already be narrowed to this tile's filters.
    pub fn trigger(&self, values: FilterValues, trigger: Trigger) -> JoinHandle<()> {
        let mut generation = 0;
        self.state.send_modify(|snapshot| {
            snapshot.generation += 1;
            snapshot.state = TileState::Loading;
            generation = snapshot.generation;
        });
        debug!(tile_id = %self.tile.id, generation, ?trigger, "Tile cycle started");

        let pipeline = self.clone();
        tokio::spawn(async move {
            let outcome = pipeline.run_cycle(&values).await;
            pipeline.complete(generation, outcome);
        })
    }

    async fn run_cycle(&self, values: &FilterValues) -> Result<QueryResult, TileError> {
        let resolved = self.resolver.resolve(&self.tile.query, values)?;
        let execution = self.backend.execute(&self.tile.data_source_id, &resolved.text);

        match tokio::time::timeout(self.budget, execution).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TileError::Timeout(self.budget)),
        }
    }

    /// Applies a finished cycle unless a newer one has been issued since.
    fn complete(&self, generation: u64, outcome: Result<QueryResult, TileError>) {
        let tile_id = self.tile.id.as_str();
        self.state.send_if_modified(|snapshot| {
            if snapshot.generation != generation {
                debug!(tile_id, generation, latest = snapshot.generation, "Discarding stale tile result");
                return false;
            }

            snapshot.state = match outcome {
                Ok(rows) => {
                    debug!(tile_id, generation, rows = rows.len(), "Tile ready");
                    TileState::Ready { rows }
                }
                Err(e) => {
                    warn!(tile_id, generation, error = %e, "Tile query failed");
                    TileState::Error { message: e.to_string() }
                }
            };
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::Value;
    use crate::domain::tile::TilePosition;
    use crate::infrastructure::memory_backend::MemoryBackend;
    use crate::test_support::{LARGE_QUERY, ScriptedBackend, large_registry, registry, rows, tile};

    fn pipeline(query: &str, backend: Arc<dyn QueryBackend>, timeout: Duration) -> TilePipeline {
        let settings = PipelineSettings {
            execution_timeout: timeout,
            unresolved: UnresolvedPolicy::PassThrough,
        };
        TilePipeline::new(tile("t1", query, TilePosition::default()), backend, settings)
    }

    #[tokio::test]
    async fn test_cycle_reaches_ready() {
        let backend = Arc::new(MemoryBackend::new(Arc::new(registry())));
        let p = pipeline(
            "SELECT COUNT() AS n FROM analytics WHERE blob4 = ${country}",
            backend,
            DEFAULT_EXECUTION_TIMEOUT,
        );
        assert_eq!(p.snapshot(), TileSnapshot::default());

        let mut values = FilterValues::new();
        values.insert("country".to_string(), crate::domain::filter::FilterValue::scalar("DE"));
        p.trigger(values, Trigger::Mount).await.unwrap();

        let snapshot = p.snapshot();
        assert_eq!(snapshot.generation, 1);
        match snapshot.state {
            TileState::Ready { rows } => assert_eq!(rows.rows[0].get("n"), Some(&Value::Number(2.0))),
            other => panic!("expected ready, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_late_first_result_is_discarded() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            (Duration::from_millis(150), Ok(rows("first"))),
            (Duration::from_millis(10), Ok(rows("second"))),
        ]));
        let p = pipeline("SELECT v FROM t", backend, DEFAULT_EXECUTION_TIMEOUT);

        let first = p.trigger(FilterValues::new(), Trigger::Refresh);
        let second = p.trigger(FilterValues::new(), Trigger::Refresh);
        second.await.unwrap();
        first.await.unwrap();

        let snapshot = p.snapshot();
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.state, TileState::Ready { rows: rows("second") });
    }

    #[tokio::test]
    async fn test_loading_is_published_before_completion() {
        let backend = Arc::new(ScriptedBackend::new(vec![(Duration::from_millis(50), Ok(rows("x")))]));
        let p = pipeline("SELECT v FROM t", backend, DEFAULT_EXECUTION_TIMEOUT);
        let mut rx = p.subscribe();

        let handle = p.trigger(FilterValues::new(), Trigger::Mount);
        assert_eq!(rx.borrow_and_update().state, TileState::Loading);

        handle.await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().state.is_settled());
    }

    #[tokio::test]
    async fn test_timeout_moves_tile_to_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![(Duration::from_millis(500), Ok(rows("late")))]));
        let p = pipeline("SELECT v FROM t", backend, Duration::from_millis(20));

        p.trigger(FilterValues::new(), Trigger::Refresh).await.unwrap();

        match p.snapshot().state {
            TileState::Error { message } => assert!(message.contains("timed out"), "{}", message),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_in_memory_scan_times_out() {
        let backend = Arc::new(MemoryBackend::new(Arc::new(large_registry(400_000))));
        let p = pipeline(LARGE_QUERY, backend, Duration::from_millis(1));

        p.trigger(FilterValues::new(), Trigger::Refresh).await.unwrap();

        match p.snapshot().state {
            TileState::Error { message } => assert_eq!(message, "query timed out after 1ms"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_clears_rows_and_spares_siblings() {
        let backend: Arc<dyn QueryBackend> = Arc::new(MemoryBackend::new(Arc::new(registry())));
        let good = pipeline("SELECT date FROM analytics", backend.clone(), DEFAULT_EXECUTION_TIMEOUT);
        let bad = pipeline("SELECT double9 FROM analytics", backend, DEFAULT_EXECUTION_TIMEOUT);

        let (a, b) = tokio::join!(
            good.trigger(FilterValues::new(), Trigger::Mount),
            bad.trigger(FilterValues::new(), Trigger::Mount)
        );
        a.unwrap();
        b.unwrap();

        assert!(matches!(good.snapshot().state, TileState::Ready { ref rows } if rows.len() == 7));
        assert_eq!(
            bad.snapshot().state,
            TileState::Error {
                message: "unknown column: double9".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reject_policy_fails_before_backend() {
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));
        let settings = PipelineSettings {
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
            unresolved: UnresolvedPolicy::Reject,
        };
        let p = TilePipeline::new(
            tile("t1", "SELECT v FROM t WHERE v = ${missing}", TilePosition::default()),
            backend.clone(),
            settings,
        );

        p.trigger(FilterValues::new(), Trigger::Mount).await.unwrap();

        assert!(matches!(p.snapshot().state, TileState::Error { ref message } if message.contains("missing")));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = TileSnapshot {
            generation: 3,
            state: TileState::Error {
                message: "boom".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            serde_json::json!({"generation": 3, "status": "error", "message": "boom"})
        );
    }
}
