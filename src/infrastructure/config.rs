// Configuration loading - Server settings, dashboards and datasets
use crate::application::parameter_resolver::UnresolvedPolicy;
use crate::application::tile_pipeline::{PipelineSettings, DEFAULT_EXECUTION_TIMEOUT};
use crate::domain::dashboard::Dashboard;
use crate::domain::data_source::{ColumnMappingError, DataSource};
use crate::domain::dataset::{Table, Value};
use crate::domain::filter::{Applicability, FilterError};
use crate::domain::tile::PositionError;
use crate::infrastructure::memory_registry::InMemoryRegistry;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_timeout_ms")]
    pub execution_timeout_ms: u64,
    #[serde(default)]
    pub unresolved_placeholders: UnresolvedPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            execution_timeout_ms: default_timeout_ms(),
            unresolved_placeholders: UnresolvedPolicy::default(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_EXECUTION_TIMEOUT.as_millis() as u64
}

impl PipelineConfig {
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            execution_timeout: Duration::from_millis(self.execution_timeout_ms),
            unresolved: self.unresolved_placeholders,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Memory,
    Http,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    pub host: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardsConfig {
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    #[serde(default)]
    pub dashboards: Vec<Dashboard>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatasetsConfig {
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    pub data_source: String,
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("backend.host is required when backend.kind is \"http\"")]
    MissingBackendHost,

    #[error("data source {data_source}: {source}")]
    ColumnMapping {
        data_source: String,
        source: ColumnMappingError,
    },

    #[error("dashboard {dashboard}: duplicate {kind} {id}")]
    Duplicate {
        dashboard: String,
        kind: &'static str,
        id: String,
    },

    #[error("dashboard {dashboard}, tile {tile}: {source}")]
    Position {
        dashboard: String,
        tile: String,
        source: PositionError,
    },

    #[error("dashboard {dashboard}, tile {tile}: unknown data source {data_source}")]
    UnknownDataSource {
        dashboard: String,
        tile: String,
        data_source: String,
    },

    #[error("dashboard {dashboard}, filter {filter}: applies to unknown tile {tile}")]
    UnknownTile {
        dashboard: String,
        filter: String,
        tile: String,
    },

    #[error("dashboard {dashboard}, filter {filter}: bad default value: {source}")]
    DefaultValue {
        dashboard: String,
        filter: String,
        source: FilterError,
    },

    #[error("table {table}: row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        table: String,
        row: usize,
        found: usize,
        expected: usize,
    },
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.kind == BackendKind::Http && self.backend.host.is_none() {
            return Err(ConfigError::MissingBackendHost);
        }
        Ok(())
    }
}

impl DashboardsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for data_source in &self.data_sources {
            data_source.validate().map_err(|source| ConfigError::ColumnMapping {
                data_source: data_source.id.clone(),
                source,
            })?;
        }

        let known_sources: HashSet<&str> = self.data_sources.iter().map(|d| d.id.as_str()).collect();
        for dashboard in &self.dashboards {
            validate_dashboard(dashboard, &known_sources)?;
        }
        Ok(())
    }
}

fn validate_dashboard(dashboard: &Dashboard, known_sources: &HashSet<&str>) -> Result<(), ConfigError> {
    let duplicate = |kind, id: &str| ConfigError::Duplicate {
        dashboard: dashboard.id.clone(),
        kind,
        id: id.to_string(),
    };

    let mut tile_ids = HashSet::new();
    for tile in &dashboard.tiles {
        if !tile_ids.insert(tile.id.as_str()) {
            return Err(duplicate("tile", &tile.id));
        }
        tile.position.validate().map_err(|source| ConfigError::Position {
            dashboard: dashboard.id.clone(),
            tile: tile.id.clone(),
            source,
        })?;
        // An empty source list means data sources are not declared at all.
        if !known_sources.is_empty() && !known_sources.contains(tile.data_source_id.as_str()) {
            return Err(ConfigError::UnknownDataSource {
                dashboard: dashboard.id.clone(),
                tile: tile.id.clone(),
                data_source: tile.data_source_id.clone(),
            });
        }
    }

    let mut parameters = HashSet::new();
    for filter in &dashboard.filters {
        if !parameters.insert(filter.parameter_name.as_str()) {
            return Err(duplicate("filter parameter", &filter.parameter_name));
        }
        if let Applicability::Tiles(targets) = &filter.applies_to {
            if let Some(unknown) = targets.iter().find(|t| !tile_ids.contains(t.as_str())) {
                return Err(ConfigError::UnknownTile {
                    dashboard: dashboard.id.clone(),
                    filter: filter.id.clone(),
                    tile: unknown.clone(),
                });
            }
        }
        if let Some(default) = &filter.default_value {
            filter.validate_value(default).map_err(|source| ConfigError::DefaultValue {
                dashboard: dashboard.id.clone(),
                filter: filter.id.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

impl DatasetsConfig {
    pub fn into_registry(self) -> Result<InMemoryRegistry, ConfigError> {
        let mut registry = InMemoryRegistry::new();
        for config in self.tables {
            let table = Table {
                name: config.name,
                columns: config.columns,
                rows: config.rows,
            };
            if let Some(row) = table.first_ragged_row() {
                return Err(ConfigError::RaggedRow {
                    found: table.rows[row].len(),
                    expected: table.columns.len(),
                    table: table.name,
                    row,
                });
            }
            registry.insert(config.data_source, table);
        }
        Ok(registry)
    }
}

fn load<T: DeserializeOwned>(name: &str) -> anyhow::Result<T> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(name))
        .build()
        .with_context(|| format!("Failed to read {}", name))?;

    settings
        .try_deserialize()
        .with_context(|| format!("Failed to parse {}", name))
}

/// `config/server` is optional; `TILES__SECTION__KEY` variables override it.
pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/server").required(false))
        .add_source(
            config::Environment::with_prefix("TILES")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let server: ServerConfig = settings.try_deserialize()?;
    server.validate()?;
    Ok(server)
}

pub fn load_dashboards_config() -> anyhow::Result<DashboardsConfig> {
    let dashboards: DashboardsConfig = load("config/dashboards")?;
    dashboards.validate()?;
    Ok(dashboards)
}

pub fn load_datasets_config() -> anyhow::Result<DatasetsConfig> {
    load("config/datasets")
}
