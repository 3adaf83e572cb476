// Shared fixtures for unit tests
use crate::application::query_backend::{BackendError, QueryBackend};
use crate::domain::dashboard::Dashboard;
use crate::domain::dataset::{Table, Value};
use crate::domain::filter::{Applicability, DashboardFilter, FilterOption, FilterType, FilterValue};
use crate::domain::layout::GridColumns;
use crate::domain::query_result::{QueryResult, Row};
use crate::domain::tile::{ChartConfig, ChartType, Tile, TilePosition};
use crate::infrastructure::memory_registry::InMemoryRegistry;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Seven page-view rows, deliberately out of date order. Countries are first
/// seen as US, UK, DE.
pub fn analytics_table() -> Table {
    let row = |date: &str, country: &str, device: &str, views: f64, duration: f64| {
        vec![
            Value::text(date),
            Value::text(country),
            Value::text(device),
            Value::Number(views),
            Value::Number(duration),
        ]
    };

    Table::new("analytics", &["date", "blob4", "blob6", "double1", "double2"])
        .with_row(row("2024-12-21", "US", "desktop", 120.0, 1.5))
        .with_row(row("2024-12-19", "UK", "mobile", 80.0, 2.0))
        .with_row(row("2024-12-22", "US", "desktop", 150.0, 1.2))
        .with_row(row("2024-12-19", "DE", "tablet", 60.0, 3.1))
        .with_row(row("2024-12-20", "UK", "desktop", 95.0, 1.8))
        .with_row(row("2024-12-20", "US", "mobile", 110.0, 2.2))
        .with_row(row("2024-12-21", "DE", "desktop", 70.0, 2.5))
}

pub fn registry() -> InMemoryRegistry {
    InMemoryRegistry::new().with_table("ds-1", analytics_table())
}

/// Query over [`large_registry`] that groups and sorts every row.
pub const LARGE_QUERY: &str = "SELECT blob1, SUM(double1) AS total FROM events GROUP BY blob1 ORDER BY total DESC";

/// An `events` table in ds-1 with `rows` rows spread over 1000 keys.
pub fn large_registry(rows: usize) -> InMemoryRegistry {
    let table = (0..rows).fold(Table::new("events", &["blob1", "double1"]), |table, i| {
        table.with_row(vec![Value::text(format!("k{}", i % 1000)), Value::Number(i as f64)])
    });
    InMemoryRegistry::new().with_table("ds-1", table)
}

pub fn tile(id: &str, query: &str, position: TilePosition) -> Tile {
    Tile {
        id: id.to_string(),
        title: id.to_string(),
        data_source_id: "ds-1".to_string(),
        query: query.to_string(),
        chart: ChartConfig {
            chart_type: ChartType::Table,
            title: None,
            show_legend: true,
            show_grid: true,
            x_axis_key: None,
            y_axis_keys: Vec::new(),
            colors: Vec::new(),
            stat: None,
        },
        position,
        refresh_interval: None,
    }
}

/// Two tiles: `by-country` follows both filters, `trend` only the date range.
pub fn dashboard() -> Dashboard {
    Dashboard {
        id: "web".to_string(),
        name: "Web".to_string(),
        description: None,
        tiles: vec![
            tile(
                "by-country",
                "SELECT blob4, COUNT() AS visits FROM analytics \
                 WHERE date BETWEEN ${date_range} AND blob6 = ${device} GROUP BY blob4",
                TilePosition::new(0, 0, 2, 2),
            ),
            tile(
                "trend",
                "SELECT date, SUM(double1) AS views FROM analytics \
                 WHERE date BETWEEN ${date_range} GROUP BY date ORDER BY date",
                TilePosition::new(2, 0, 2, 1),
            ),
        ],
        filters: vec![
            DashboardFilter {
                id: "f-date".to_string(),
                name: "Date".to_string(),
                parameter_name: "date_range".to_string(),
                filter_type: FilterType::DateRange,
                default_value: Some(FilterValue::range("2024-12-19", "2024-12-22")),
                options: Vec::new(),
                applies_to: Applicability::All,
            },
            DashboardFilter {
                id: "f-device".to_string(),
                name: "Device".to_string(),
                parameter_name: "device".to_string(),
                filter_type: FilterType::Dropdown,
                default_value: Some(FilterValue::scalar("desktop")),
                options: ["desktop", "mobile", "tablet"]
                    .iter()
                    .map(|v| FilterOption {
                        label: v.to_string(),
                        value: v.to_string(),
                    })
                    .collect(),
                applies_to: Applicability::Tiles(vec!["by-country".to_string()]),
            },
        ],
        grid_columns: GridColumns::DEFAULT,
    }
}

/// A one-row result `{"v": marker}`.
pub fn rows(marker: &str) -> QueryResult {
    let mut row = Row::new();
    row.push("v", Value::text(marker));
    QueryResult::new(vec![row])
}

/// Backend that answers calls in order from a script of (delay, outcome).
/// Calls past the end of the script return an empty result at once.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<(Duration, Result<QueryResult, String>)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<(Duration, Result<QueryResult, String>)>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryBackend for ScriptedBackend {
    async fn execute(&self, _data_source_id: &str, sql: &str) -> Result<QueryResult, BackendError> {
        self.calls.lock().unwrap().push(sql.to_string());
        let step = self.script.lock().unwrap().pop_front();

        let Some((delay, outcome)) = step else {
            return Ok(QueryResult::default());
        };
        tokio::time::sleep(delay).await;
        outcome.map_err(|body| BackendError::Status { status: 500, body })
    }
}
