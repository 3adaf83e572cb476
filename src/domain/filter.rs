// Filter domain model - Dashboard parameters and their typed values
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Active value of one filter: a single literal or an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Range([String; 2]),
    Scalar(String),
}

impl FilterValue {
    #[cfg(test)]
    pub fn scalar(value: impl Into<String>) -> Self {
        FilterValue::Scalar(value.into())
    }

    #[cfg(test)]
    pub fn range(lo: impl Into<String>, hi: impl Into<String>) -> Self {
        FilterValue::Range([lo.into(), hi.into()])
    }

    /// Literal text substituted for a placeholder: `'v'` or `'lo' AND 'hi'`.
    pub fn to_literal(&self) -> String {
        match self {
            FilterValue::Scalar(value) => format!("'{}'", value),
            FilterValue::Range([lo, hi]) => format!("'{}' AND '{}'", lo, hi),
        }
    }

    fn contains_quote(&self) -> bool {
        match self {
            FilterValue::Scalar(value) => value.contains('\''),
            FilterValue::Range([lo, hi]) => lo.contains('\'') || hi.contains('\''),
        }
    }
}

/// Parameter name to active value. Ordered so iteration is reproducible.
pub type FilterValues = BTreeMap<String, FilterValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    DateRange,
    Dropdown,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub label: String,
    pub value: String,
}

/// Which tiles a filter parameterizes. Written as `"all"` or a list of tile ids.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ApplicabilityRepr", into = "ApplicabilityRepr")]
pub enum Applicability {
    #[default]
    All,
    Tiles(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ApplicabilityRepr {
    Keyword(String),
    Tiles(Vec<String>),
}

impl TryFrom<ApplicabilityRepr> for Applicability {
    type Error = String;

    fn try_from(repr: ApplicabilityRepr) -> Result<Self, Self::Error> {
        match repr {
            ApplicabilityRepr::Keyword(keyword) if keyword == "all" => Ok(Applicability::All),
            ApplicabilityRepr::Keyword(other) => {
                Err(format!("expected \"all\" or a list of tile ids, got {:?}", other))
            }
            ApplicabilityRepr::Tiles(tiles) => Ok(Applicability::Tiles(tiles)),
        }
    }
}

impl From<Applicability> for ApplicabilityRepr {
    fn from(applicability: Applicability) -> Self {
        match applicability {
            Applicability::All => ApplicabilityRepr::Keyword("all".to_string()),
            Applicability::Tiles(tiles) => ApplicabilityRepr::Tiles(tiles),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown filter parameter: {0}")]
    UnknownParameter(String),
    #[error("{parameter} expects a [from, to] range")]
    ExpectedRange { parameter: String },
    #[error("{parameter} expects a single value")]
    ExpectedScalar { parameter: String },
    #[error("{parameter}: {value} is not a YYYY-MM-DD date")]
    InvalidDate { parameter: String, value: String },
    #[error("{parameter}: range start is after range end")]
    InvertedRange { parameter: String },
    #[error("{parameter}: {value} is not one of the dropdown options")]
    NotAnOption { parameter: String, value: String },
    #[error("{parameter}: values may not contain single quotes")]
    QuoteInValue { parameter: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub id: String,
    pub name: String,
    pub parameter_name: String,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    #[serde(default)]
    pub default_value: Option<FilterValue>,
    #[serde(default)]
    pub options: Vec<FilterOption>,
    #[serde(default)]
    pub applies_to: Applicability,
}

impl DashboardFilter {
    pub fn applies_to_tile(&self, tile_id: &str) -> bool {
        match &self.applies_to {
            Applicability::All => true,
            Applicability::Tiles(tiles) => tiles.iter().any(|t| t == tile_id),
        }
    }

    /// Checks a value against the declared filter type. Values reach the
    /// resolver unescaped, so this is where untrusted text is stopped.
    pub fn validate_value(&self, value: &FilterValue) -> Result<(), FilterError> {
        let parameter = || self.parameter_name.clone();

        if value.contains_quote() {
            return Err(FilterError::QuoteInValue { parameter: parameter() });
        }

        match (self.filter_type, value) {
            (FilterType::DateRange, FilterValue::Range([lo, hi])) => {
                let from = parse_date(lo).ok_or_else(|| FilterError::InvalidDate {
                    parameter: parameter(),
                    value: lo.clone(),
                })?;
                let to = parse_date(hi).ok_or_else(|| FilterError::InvalidDate {
                    parameter: parameter(),
                    value: hi.clone(),
                })?;
                if from > to {
                    return Err(FilterError::InvertedRange { parameter: parameter() });
                }
                Ok(())
            }
            (FilterType::DateRange, FilterValue::Scalar(_)) => {
                Err(FilterError::ExpectedRange { parameter: parameter() })
            }
            (FilterType::Dropdown, FilterValue::Scalar(choice)) => {
                if self.options.is_empty() || self.options.iter().any(|o| &o.value == choice) {
                    Ok(())
                } else {
                    Err(FilterError::NotAnOption {
                        parameter: parameter(),
                        value: choice.clone(),
                    })
                }
            }
            (FilterType::Text, FilterValue::Scalar(_)) => Ok(()),
            (FilterType::Dropdown | FilterType::Text, FilterValue::Range(_)) => {
                Err(FilterError::ExpectedScalar { parameter: parameter() })
            }
        }
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
