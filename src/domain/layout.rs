// Layout engine - Maps tile positions to concrete grid placements
use super::tile::Tile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("grid column count must be 2, 3 or 4, got {0}")]
pub struct InvalidGridColumns(pub u8);

/// Column count of a dashboard grid. Only 2, 3 and 4 are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GridColumns(u8);

impl GridColumns {
    pub const DEFAULT: GridColumns = GridColumns(4);

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }
}

impl Default for GridColumns {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for GridColumns {
    type Error = InvalidGridColumns;

    fn try_from(columns: u8) -> Result<Self, Self::Error> {
        match columns {
            2..=4 => Ok(GridColumns(columns)),
            other => Err(InvalidGridColumns(other)),
        }
    }
}

impl From<GridColumns> for u8 {
    fn from(columns: GridColumns) -> Self {
        columns.0
    }
}

/// One-based grid lines, ready for a CSS-grid style renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridPlacement {
    pub tile_id: String,
    pub column_start: u32,
    pub column_span: u32,
    pub row_start: u32,
    pub row_span: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub placements: Vec<GridPlacement>,
}

impl GridLayout {
    #[cfg(test)]
    pub fn placement(&self, tile_id: &str) -> Option<&GridPlacement> {
        self.placements.iter().find(|p| p.tile_id == tile_id)
    }
}

/// No collision detection or reflow: overlapping tiles keep their coordinates.
pub fn compute_layout(tiles: &[Tile], columns: GridColumns) -> GridLayout {
    let column_count = columns.get();

    let placements = tiles
        .iter()
        .map(|tile| {
            let position = tile.position;
            // Never let a tile run past the right edge, and never collapse to zero.
            let column_span = position
                .width
                .min(column_count.saturating_sub(position.x))
                .max(1);

            GridPlacement {
                tile_id: tile.id.clone(),
                column_start: position.x + 1,
                column_span,
                row_start: position.y + 1,
                row_span: position.height,
            }
        })
        .collect();

    GridLayout {
        columns: column_count,
        rows: total_rows(tiles),
        placements,
    }
}

/// Bottom edge of the lowest tile, or 1 for an empty dashboard.
pub fn total_rows(tiles: &[Tile]) -> u32 {
    tiles
        .iter()
        .map(|t| t.position.y + t.position.height)
        .max()
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::{ChartConfig, ChartType, TilePosition};

    fn tile(id: &str, x: u32, y: u32, width: u32, height: u32) -> Tile {
        Tile {
            id: id.to_string(),
            title: id.to_string(),
            data_source_id: "ds-1".to_string(),
            query: "SELECT * FROM analytics".to_string(),
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
            position: TilePosition::new(x, y, width, height),
            refresh_interval: None,
        }
    }

    #[test]
    fn test_empty_layout_has_one_row() {
        for columns in [2u8, 3, 4] {
            let layout = compute_layout(&[], GridColumns::try_from(columns).unwrap());
            assert_eq!(layout.rows, 1);
            assert!(layout.placements.is_empty());
        }
    }

    #[test]
    fn test_layout_two_tiles() {
        let tiles = vec![tile("a", 0, 0, 2, 2), tile("b", 2, 2, 2, 1)];
        let layout = compute_layout(&tiles, GridColumns::DEFAULT);

        assert_eq!(layout.rows, 3);
        assert_eq!(
            layout.placement("a"),
            Some(&GridPlacement {
                tile_id: "a".to_string(),
                column_start: 1,
                column_span: 2,
                row_start: 1,
                row_span: 2,
            })
        );
        let second = layout.placement("b").unwrap();
        assert_eq!(second.column_start, 3);
        assert_eq!(second.column_span, 2);
        assert_eq!(second.row_start, 3);
        assert_eq!(second.row_span, 1);
    }

    #[test]
    fn test_layout_clamps_overflowing_width() {
        let layout = compute_layout(&[tile("wide", 3, 0, 4, 1)], GridColumns::DEFAULT);
        let placement = layout.placement("wide").unwrap();
        assert_eq!(placement.column_start, 4);
        assert_eq!(placement.column_span, 1);
    }

    #[test]
    fn test_layout_does_not_clamp_height() {
        let layout = compute_layout(&[tile("tall", 0, 5, 1, 3)], GridColumns::try_from(2).unwrap());
        assert_eq!(layout.rows, 8);
        assert_eq!(layout.placement("tall").unwrap().row_span, 3);
    }

    #[test]
    fn test_layout_keeps_span_positive_past_right_edge() {
        let layout = compute_layout(&[tile("off", 5, 0, 2, 1)], GridColumns::try_from(3).unwrap());
        assert_eq!(layout.placement("off").unwrap().column_span, 1);
    }

    #[test]
    fn test_grid_columns_range() {
        assert!(GridColumns::try_from(1).is_err());
        assert!(GridColumns::try_from(5).is_err());
        assert_eq!(GridColumns::try_from(3).unwrap().get(), 3);
        assert!(serde_json::from_str::<GridColumns>("6").is_err());
    }
}
