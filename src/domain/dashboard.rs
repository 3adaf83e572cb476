// Dashboard domain model
use super::filter::{DashboardFilter, FilterError, FilterValues};
use super::layout::GridColumns;
use super::tile::Tile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub filters: Vec<DashboardFilter>,
    #[serde(default)]
    pub grid_columns: GridColumns,
}

impl Dashboard {
    pub fn filter(&self, parameter_name: &str) -> Option<&DashboardFilter> {
        self.filters.iter().find(|f| f.parameter_name == parameter_name)
    }

    /// Values the dashboard opens with (and resets to).
    pub fn default_filter_values(&self) -> FilterValues {
        self.filters
            .iter()
            .filter_map(|f| {
                f.default_value
                    .as_ref()
                    .map(|value| (f.parameter_name.clone(), value.clone()))
            })
            .collect()
    }

    /// The subset of `values` whose filters apply to `tile_id`.
    pub fn applicable_values(&self, tile_id: &str, values: &FilterValues) -> FilterValues {
        self.filters
            .iter()
            .filter(|f| f.applies_to_tile(tile_id))
            .filter_map(|f| {
                values
                    .get(&f.parameter_name)
                    .map(|value| (f.parameter_name.clone(), value.clone()))
            })
            .collect()
    }

    pub fn validate_filter_values(&self, values: &FilterValues) -> Result<(), FilterError> {
        for (parameter, value) in values {
            let filter = self
                .filter(parameter)
                .ok_or_else(|| FilterError::UnknownParameter(parameter.clone()))?;
            filter.validate_value(value)?;
        }
        Ok(())
    }
}
