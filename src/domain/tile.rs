// Tile domain model - Query template, chart settings and grid position
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Area,
    Bar,
    Line,
    Pie,
    Scatter,
    Table,
    Stat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatFormat {
    #[default]
    Number,
    Currency,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatCardConfig {
    pub value_key: String,
    pub label: Option<String>,
    pub comparison_key: Option<String>,
    pub comparison_label: Option<String>,
    #[serde(default)]
    pub format: StatFormat,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

/// Rendering hints. The pipeline never looks inside; clients do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub show_legend: bool,
    #[serde(default = "default_true")]
    pub show_grid: bool,
    pub x_axis_key: Option<String>,
    #[serde(default)]
    pub y_axis_keys: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    pub stat: Option<StatCardConfig>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("width {0} is outside 1..={max}", max = TilePosition::MAX_WIDTH)]
    Width(u32),
    #[error("height {0} is outside 1..={max}", max = TilePosition::MAX_HEIGHT)]
    Height(u32),
}

/// Zero-based grid coordinates plus spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePosition {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TilePosition {
    pub const MAX_WIDTH: u32 = 4;
    pub const MAX_HEIGHT: u32 = 3;

    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Checks spans only. Overflow past the right edge is clamped at layout time.
    pub fn validate(&self) -> Result<(), PositionError> {
        if !(1..=Self::MAX_WIDTH).contains(&self.width) {
            return Err(PositionError::Width(self.width));
        }
        if !(1..=Self::MAX_HEIGHT).contains(&self.height) {
            return Err(PositionError::Height(self.height));
        }
        Ok(())
    }
}

impl Default for TilePosition {
    fn default() -> Self {
        Self::new(0, 0, 2, 2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub id: String,
    pub title: String,
    pub data_source_id: String,
    pub query: String,
    pub chart: ChartConfig,
    #[serde(default)]
    pub position: TilePosition,
    /// Auto-refresh interval in seconds.
    #[serde(default)]
    pub refresh_interval: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_validate() {
        assert_eq!(TilePosition::new(0, 0, 4, 3).validate(), Ok(()));
        assert_eq!(TilePosition::new(0, 0, 0, 1).validate(), Err(PositionError::Width(0)));
        assert_eq!(TilePosition::new(0, 0, 5, 1).validate(), Err(PositionError::Width(5)));
        assert_eq!(TilePosition::new(0, 0, 1, 4).validate(), Err(PositionError::Height(4)));
        // x overflow is not a validation concern
        assert_eq!(TilePosition::new(3, 0, 4, 1).validate(), Ok(()));
    }

    #[test]
    fn test_chart_config_defaults() {
        let chart: ChartConfig = serde_json::from_str(r#"{"type": "stat", "stat": {"value_key": "total"}}"#).unwrap();
        assert_eq!(chart.chart_type, ChartType::Stat);
        assert!(chart.show_legend);
        assert!(chart.show_grid);
        assert_eq!(chart.stat.unwrap().format, StatFormat::Number);
    }
}
