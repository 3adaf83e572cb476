// Data source domain model - Fixed-prefix physical columns and their display names
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Highest slot number for any column prefix (`blob20`, `double20`, `index20`).
pub const MAX_COLUMN_SLOT: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Blob,
    Double,
    Index,
}

impl ColumnType {
    pub fn prefix(&self) -> &'static str {
        match self {
            ColumnType::Blob => "blob",
            ColumnType::Double => "double",
            ColumnType::Index => "index",
        }
    }

    /// Splits `double5` into `(Double, 5)`. Returns `None` for anything that is
    /// not one of the fixed prefixes followed by a slot in 1..=20.
    pub fn parse_column(name: &str) -> Option<(ColumnType, u8)> {
        [ColumnType::Blob, ColumnType::Double, ColumnType::Index]
            .into_iter()
            .find_map(|kind| {
                let digits = name.strip_prefix(kind.prefix())?;
                if digits.is_empty() || digits.starts_with('0') {
                    return None;
                }
                let slot: u8 = digits.parse().ok()?;
                (1..=MAX_COLUMN_SLOT).contains(&slot).then_some((kind, slot))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnMappingError {
    #[error("{0} is not a blobN/doubleN/indexN column with N in 1..=20")]
    InvalidName(String),
    #[error("{column} is declared as {declared:?} but its prefix says {actual:?}")]
    TypeMismatch {
        column: String,
        declared: ColumnType,
        actual: ColumnType,
    },
    #[error("{0} is mapped more than once")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_column: String,
    pub friendly_name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub description: Option<String>,
}

impl ColumnMapping {
    pub fn validate(&self) -> Result<(), ColumnMappingError> {
        let (actual, _) = ColumnType::parse_column(&self.source_column)
            .ok_or_else(|| ColumnMappingError::InvalidName(self.source_column.clone()))?;
        if actual != self.column_type {
            return Err(ColumnMappingError::TypeMismatch {
                column: self.source_column.clone(),
                declared: self.column_type,
                actual,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub column_mappings: Vec<ColumnMapping>,
}

impl DataSource {
    pub fn validate(&self) -> Result<(), ColumnMappingError> {
        let mut seen = HashSet::new();
        for mapping in &self.column_mappings {
            mapping.validate()?;
            if !seen.insert(mapping.source_column.as_str()) {
                return Err(ColumnMappingError::Duplicate(mapping.source_column.clone()));
            }
        }
        Ok(())
    }
}
