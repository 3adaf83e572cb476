// Streaming dashboard service - Skeleton first, then every tile state change
use crate::application::dashboard_service::{DashboardService, DashboardSession, TileStatus};
use crate::domain::filter::FilterValues;
use crate::domain::layout::GridLayout;
use crate::domain::tile::ChartConfig;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{StreamExt, StreamMap};

const STREAM_BUFFER: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct TileSkeleton {
    pub id: String,
    pub title: String,
    pub data_source_id: String,
    pub chart: ChartConfig,
}

/// Everything a client needs to draw empty tiles before data arrives.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSkeleton {
    pub dashboard_id: String,
    pub name: String,
    pub layout: GridLayout,
    pub filter_values: FilterValues,
    pub tiles: Vec<TileSkeleton>,
}

impl DashboardSkeleton {
    fn of(session: &DashboardSession) -> Self {
        let dashboard = session.dashboard();
        Self {
            dashboard_id: dashboard.id.clone(),
            name: dashboard.name.clone(),
            layout: session.layout(),
            filter_values: session.filter_values(),
            tiles: dashboard
                .tiles
                .iter()
                .map(|t| TileSkeleton {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    data_source_id: t.data_source_id.clone(),
                    chart: t.chart.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Skeleton(DashboardSkeleton),
    TileUpdate(TileStatus),
}

#[derive(Clone)]
pub struct StreamingDashboardService {
    dashboards: DashboardService,
}

impl StreamingDashboardService {
    pub fn new(dashboards: DashboardService) -> Self {
        Self { dashboards }
    }

    /// Sends the skeleton, then each tile's current state, then every later
    /// transition until the receiver is dropped. `None` for an unknown dashboard.
    pub fn stream_dashboard(&self, dashboard_id: &str) -> Option<mpsc::Receiver<StreamMessage>> {
        let session = self.dashboards.session(dashboard_id)?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        let skeleton = DashboardSkeleton::of(&session);
        let mut updates = StreamMap::new();
        for pipeline in session.pipelines() {
            updates.insert(pipeline.tile().id.clone(), WatchStream::new(pipeline.subscribe()));
        }
        let dashboard_id = dashboard_id.to_string();

        tokio::spawn(async move {
            if tx.send(StreamMessage::Skeleton(skeleton)).await.is_err() {
                return;
            }

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    next = updates.next() => {
                        let Some((tile_id, snapshot)) = next else {
                            break;
                        };
                        let update = StreamMessage::TileUpdate(TileStatus { tile_id, snapshot });
                        if tx.send(update).await.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(%dashboard_id, "Dashboard stream closed");
        });

        Some(rx)
    }
}
