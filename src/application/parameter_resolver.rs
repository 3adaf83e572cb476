// Parameter resolver - Substitutes dashboard filter values into tile query templates
use crate::domain::filter::FilterValues;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// What happens to `${name}` placeholders that have no filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Leave the placeholder in the text; the interpreter reports it.
    #[default]
    PassThrough,
    /// Fail before the query is submitted.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("no filter value for placeholder(s): {}", .0.join(", "))]
    MissingValues(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub text: String,
    /// Placeholder names left in `text`, in order of first appearance.
    pub unresolved: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterResolver {
    policy: UnresolvedPolicy,
}

impl ParameterResolver {
    pub fn new(policy: UnresolvedPolicy) -> Self {
        Self { policy }
    }

    pub fn resolve(&self, template: &str, values: &FilterValues) -> Result<ResolvedQuery, ResolutionError> {
        let resolved = substitute(template, values);
        if resolved.unresolved.is_empty() {
            return Ok(resolved);
        }

        match self.policy {
            UnresolvedPolicy::PassThrough => {
                debug!(unresolved = ?resolved.unresolved, "Passing unresolved placeholders through");
                Ok(resolved)
            }
            UnresolvedPolicy::Reject => Err(ResolutionError::MissingValues(resolved.unresolved)),
        }
    }
}

/// Replaces every `${name}` that has a value with its quoted literal. An
/// unterminated `${` is copied as is.
pub fn substitute(template: &str, values: &FilterValues) -> ResolvedQuery {
    let mut text = String::with_capacity(template.len());
    let mut unresolved: Vec<String> = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        text.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let Some(end) = body.find('}') else {
            text.push_str(&rest[start..]);
            return ResolvedQuery { text, unresolved };
        };

        let name = &body[..end];
        match values.get(name) {
            Some(value) => text.push_str(&value.to_literal()),
            None => {
                text.push_str(&rest[start..start + end + 3]);
                if !unresolved.iter().any(|n| n == name) {
                    unresolved.push(name.to_string());
                }
            }
        }
        rest = &body[end + 1..];
    }

    text.push_str(rest);
    ResolvedQuery { text, unresolved }
}
