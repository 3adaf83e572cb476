// Dashboard service - Live sessions that own filter values and fan them out to tiles
use crate::application::query_backend::QueryBackend;
use crate::application::tile_pipeline::{PipelineSettings, TilePipeline, TileSnapshot, Trigger};
use crate::domain::dashboard::Dashboard;
use crate::domain::data_source::DataSource;
use crate::domain::filter::{FilterError, FilterValues};
use crate::domain::layout::{compute_layout, GridLayout};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One tile's id with its current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileStatus {
    pub tile_id: String,
    #[serde(flatten)]
    pub snapshot: TileSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tile_count: usize,
}

/// A mounted dashboard: its tiles' pipelines and the active filter values.
pub struct DashboardSession {
    dashboard: Dashboard,
    pipelines: Vec<TilePipeline>,
    values: Mutex<FilterValues>,
    refresh_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DashboardSession {
    pub fn new(dashboard: Dashboard, backend: Arc<dyn QueryBackend>, settings: PipelineSettings) -> Arc<Self> {
        let pipelines = dashboard
            .tiles
            .iter()
            .map(|tile| TilePipeline::new(tile.clone(), backend.clone(), settings))
            .collect();
        let values = dashboard.default_filter_values();

        let session = Arc::new(Self {
            dashboard,
            pipelines,
            values: Mutex::new(values),
            refresh_tasks: Mutex::new(Vec::new()),
        });
        session.spawn_auto_refresh();
        session
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn pipelines(&self) -> &[TilePipeline] {
        &self.pipelines
    }

    pub fn filter_values(&self) -> FilterValues {
        self.lock_values().clone()
    }

    pub fn layout(&self) -> GridLayout {
        compute_layout(&self.dashboard.tiles, self.dashboard.grid_columns)
    }

    /// Every tile's state, in tile order.
    pub fn snapshot(&self) -> Vec<TileStatus> {
        self.pipelines
            .iter()
            .map(|p| TileStatus {
                tile_id: p.tile().id.clone(),
                snapshot: p.snapshot(),
            })
            .collect()
    }

    pub fn mount(&self) {
        self.trigger_all(Trigger::Mount);
    }

    pub fn refresh(&self) {
        self.trigger_all(Trigger::Refresh);
    }

    /// Returns false when the dashboard has no such tile.
    pub fn refresh_tile(&self, tile_id: &str) -> bool {
        self.trigger_tile(tile_id, Trigger::Refresh)
    }

    /// Validates and merges `updates` into the active values, then triggers
    /// the tiles whose applicable values changed. Returns their ids.
    pub fn apply_filters(&self, updates: FilterValues) -> Result<Vec<String>, FilterError> {
        self.dashboard.validate_filter_values(&updates)?;

        let mut values = self.lock_values();
        let mut next = values.clone();
        next.extend(updates);
        Ok(self.fan_out(&mut values, next))
    }

    /// Restores the filters' defaults with the same fan-out rule.
    pub fn reset_filters(&self) -> Vec<String> {
        let mut values = self.lock_values();
        self.fan_out(&mut values, self.dashboard.default_filter_values())
    }

    fn fan_out(&self, current: &mut FilterValues, next: FilterValues) -> Vec<String> {
        let mut triggered = Vec::new();
        for pipeline in &self.pipelines {
            let tile_id = &pipeline.tile().id;
            let before = self.dashboard.applicable_values(tile_id, current);
            let after = self.dashboard.applicable_values(tile_id, &next);
            if before != after {
                pipeline.trigger(after, Trigger::FilterChange);
                triggered.push(tile_id.clone());
            }
        }
        debug!(dashboard_id = %self.dashboard.id, ?triggered, "Filter values changed");
        *current = next;
        triggered
    }

    fn trigger_all(&self, trigger: Trigger) {
        let values = self.lock_values();
        for pipeline in &self.pipelines {
            let applicable = self.dashboard.applicable_values(&pipeline.tile().id, &values);
            pipeline.trigger(applicable, trigger);
        }
    }

    fn trigger_tile(&self, tile_id: &str, trigger: Trigger) -> bool {
        let Some(pipeline) = self.pipelines.iter().find(|p| p.tile().id == tile_id) else {
            return false;
        };
        let applicable = self.dashboard.applicable_values(tile_id, &self.lock_values());
        pipeline.trigger(applicable, trigger);
        true
    }

    fn lock_values(&self) -> MutexGuard<'_, FilterValues> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_auto_refresh(self: &Arc<Self>) {
        let mut tasks = self.refresh_tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for pipeline in &self.pipelines {
            let Some(seconds) = pipeline.tile().refresh_interval.filter(|s| *s > 0) else {
                continue;
            };
            let session: Weak<Self> = Arc::downgrade(self);
            let tile_id = pipeline.tile().id.clone();
            let period = Duration::from_secs(seconds);

            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    ticker.tick().await;
                    let Some(session) = session.upgrade() else {
                        break;
                    };
                    session.trigger_tile(&tile_id, Trigger::Interval);
                }
            }));
        }
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        let tasks = self.refresh_tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// All configured dashboards, each with a live session.
#[derive(Clone)]
pub struct DashboardService {
    sessions: Arc<Vec<Arc<DashboardSession>>>,
    data_sources: Arc<Vec<DataSource>>,
}

impl DashboardService {
    /// Creates and mounts a session per dashboard. Must run inside a tokio runtime.
    pub fn start(
        dashboards: Vec<Dashboard>,
        data_sources: Vec<DataSource>,
        backend: Arc<dyn QueryBackend>,
        settings: PipelineSettings,
    ) -> Self {
        let sessions: Vec<Arc<DashboardSession>> = dashboards
            .into_iter()
            .map(|dashboard| DashboardSession::new(dashboard, backend.clone(), settings))
            .collect();

        for session in &sessions {
            info!(
                dashboard_id = %session.dashboard().id,
                tiles = session.pipelines().len(),
                "Mounting dashboard"
            );
            session.mount();
        }

        Self {
            sessions: Arc::new(sessions),
            data_sources: Arc::new(data_sources),
        }
    }

    pub fn session(&self, dashboard_id: &str) -> Option<Arc<DashboardSession>> {
        self.sessions
            .iter()
            .find(|s| s.dashboard().id == dashboard_id)
            .cloned()
    }

    pub fn list(&self) -> Vec<DashboardSummary> {
        self.sessions
            .iter()
            .map(|s| {
                let dashboard = s.dashboard();
                DashboardSummary {
                    id: dashboard.id.clone(),
                    name: dashboard.name.clone(),
                    description: dashboard.description.clone(),
                    tile_count: dashboard.tiles.len(),
                }
            })
            .collect()
    }

    pub fn data_sources(&self) -> &[DataSource] {
        &self.data_sources
    }
}
