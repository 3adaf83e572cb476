// Query executor - Filters, groups, aggregates and sorts one in-memory table
use super::ast::{AggregateFunc, CompareOp, Operand, Predicate, SelectItem, SelectQuery, SortDirection};
use super::error::QueryError;
use super::parser::parse;
use super::registry::DatasetRegistry;
use crate::domain::dataset::{Table, Value};
use crate::domain::query_result::{QueryResult, Row};
use std::collections::{HashMap, HashSet};
use tracing::debug;

static NULL_VALUE: Value = Value::Null;

/// Parses `sql` and runs it against the registry's table for `data_source_id`.
///
/// An unknown table is not an error: it yields an empty result.
pub fn execute(sql: &str, data_source_id: &str, registry: &dyn DatasetRegistry) -> Result<QueryResult, QueryError> {
    let query = parse(sql)?;

    let Some(table) = registry.table(data_source_id, &query.table) else {
        debug!(data_source_id, table = %query.table, "Unknown table, returning empty result");
        return Ok(QueryResult::default());
    };

    execute_query(&query, table)
}

/// Runs an already parsed query. Pure: the same query and table always give
/// the same rows in the same order.
pub fn execute_query(query: &SelectQuery, table: &Table) -> Result<QueryResult, QueryError> {
    let plan = Plan::bind(query, table)?;

    let matching: Vec<&[Value]> = table
        .rows
        .iter()
        .map(Vec::as_slice)
        .filter(|row| plan.predicates.iter().all(|p| p.holds(row)))
        .collect();

    let groups = plan.group(matching);

    let mut records: Vec<Record> = groups
        .iter()
        .map(|group| {
            let values: Vec<Value> = plan.outputs.iter().map(|out| out.evaluate(group)).collect();
            let sort_value = match plan.sort_key {
                Some(SortKey::Output(i)) => values[i].clone(),
                Some(SortKey::Source(idx)) => group.first().map_or(Value::Null, |row| cell(row, idx).clone()),
                None => Value::Null,
            };
            Record { values, sort_value }
        })
        .collect();

    if let Some(direction) = plan.sort_direction {
        // Vec::sort_by is stable, so ties keep first-seen order.
        records.sort_by(|a, b| direction.apply(a.sort_value.sort_cmp(&b.sort_value)));
    }
    if let Some(limit) = query.limit {
        records.truncate(limit);
    }

    let rows = records
        .into_iter()
        .map(|record| {
            plan.outputs
                .iter()
                .map(|out| out.label.clone())
                .zip(record.values)
                .collect::<Row>()
        })
        .collect();

    Ok(QueryResult::new(rows))
}

fn cell(row: &[Value], idx: usize) -> &Value {
    row.get(idx).unwrap_or(&NULL_VALUE)
}

fn column_index(table: &Table, name: &str) -> Result<usize, QueryError> {
    table
        .column_index(name)
        .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))
}

enum BoundOperand<'q> {
    Column(usize),
    Literal(&'q Value),
}

impl<'q> BoundOperand<'q> {
    fn bind(operand: &'q Operand, table: &Table) -> Result<Self, QueryError> {
        match operand {
            Operand::Column(name) => column_index(table, name).map(BoundOperand::Column),
            Operand::Literal(value) => Ok(BoundOperand::Literal(value)),
        }
    }

    fn value<'a>(&'a self, row: &'a [Value]) -> &'a Value {
        match self {
            BoundOperand::Column(idx) => cell(row, *idx),
            BoundOperand::Literal(value) => value,
        }
    }
}

enum BoundPredicate<'q> {
    Compare {
        left: BoundOperand<'q>,
        op: CompareOp,
        right: BoundOperand<'q>,
    },
    Between {
        column: usize,
        low: BoundOperand<'q>,
        high: BoundOperand<'q>,
    },
}

impl<'q> BoundPredicate<'q> {
    fn bind(predicate: &'q Predicate, table: &Table) -> Result<Self, QueryError> {
        Ok(match predicate {
            Predicate::Compare { left, op, right } => BoundPredicate::Compare {
                left: BoundOperand::bind(left, table)?,
                op: *op,
                right: BoundOperand::bind(right, table)?,
            },
            Predicate::Between { column, low, high } => BoundPredicate::Between {
                column: column_index(table, column)?,
                low: BoundOperand::bind(low, table)?,
                high: BoundOperand::bind(high, table)?,
            },
        })
    }

    /// Null on either side never matches.
    fn holds(&self, row: &[Value]) -> bool {
        match self {
            BoundPredicate::Compare { left, op, right } => left
                .value(row)
                .compare(right.value(row))
                .is_some_and(|ordering| op.accepts(ordering)),
            BoundPredicate::Between { column, low, high } => {
                let value = cell(row, *column);
                let above = value
                    .compare(low.value(row))
                    .is_some_and(|o| CompareOp::Ge.accepts(o));
                let below = value
                    .compare(high.value(row))
                    .is_some_and(|o| CompareOp::Le.accepts(o));
                above && below
            }
        }
    }
}

enum Source {
    Column(usize),
    Aggregate(AggregateFunc, Option<usize>),
}

struct OutputColumn {
    label: String,
    source: Source,
}

impl OutputColumn {
    fn evaluate(&self, group: &[&[Value]]) -> Value {
        match &self.source {
            Source::Column(idx) => group.first().map_or(Value::Null, |row| cell(row, *idx).clone()),
            Source::Aggregate(func, arg) => aggregate(*func, *arg, group),
        }
    }
}

fn aggregate(func: AggregateFunc, arg: Option<usize>, group: &[&[Value]]) -> Value {
    let Some(idx) = arg else {
        return Value::Number(group.len() as f64);
    };
    let present = group.iter().map(|row| cell(row, idx)).filter(|v| !v.is_null());

    match func {
        AggregateFunc::Count => Value::Number(present.count() as f64),
        AggregateFunc::Sum | AggregateFunc::Avg => {
            let numbers: Vec<f64> = present.filter_map(Value::as_f64).collect();
            if numbers.is_empty() {
                return Value::Null;
            }
            let sum: f64 = numbers.iter().sum();
            if func == AggregateFunc::Avg {
                Value::Number(sum / numbers.len() as f64)
            } else {
                Value::Number(sum)
            }
        }
        AggregateFunc::Min => present.min_by(|a, b| a.sort_cmp(b)).cloned().unwrap_or(Value::Null),
        AggregateFunc::Max => present.max_by(|a, b| a.sort_cmp(b)).cloned().unwrap_or(Value::Null),
    }
}

#[derive(Clone, Copy)]
enum SortKey {
    /// Position in the select list.
    Output(usize),
    /// Table column, read from the group's first row.
    Source(usize),
}

/// Hashable view of a cell used as a grouping key.
#[derive(PartialEq, Eq, Hash)]
enum GroupKey<'a> {
    Null,
    Number(u64),
    Text(&'a str),
}

impl<'a> GroupKey<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Null => GroupKey::Null,
            // -0.0 and 0.0 group together
            Value::Number(n) if *n == 0.0 => GroupKey::Number(0.0f64.to_bits()),
            Value::Number(n) => GroupKey::Number(n.to_bits()),
            Value::Text(s) => GroupKey::Text(s),
        }
    }
}

struct Record {
    values: Vec<Value>,
    sort_value: Value,
}

/// A query with every column reference resolved to a table index.
struct Plan<'q> {
    predicates: Vec<BoundPredicate<'q>>,
    outputs: Vec<OutputColumn>,
    aggregate: bool,
    group_keys: Vec<usize>,
    sort_key: Option<SortKey>,
    sort_direction: Option<SortDirection>,
}

impl<'q> Plan<'q> {
    fn bind(query: &'q SelectQuery, table: &Table) -> Result<Self, QueryError> {
        let aggregate = query.is_aggregate();

        let predicates = query
            .selection
            .iter()
            .map(|p| BoundPredicate::bind(p, table))
            .collect::<Result<Vec<_>, _>>()?;

        let group_keys = query
            .group_by
            .iter()
            .map(|name| column_index(table, name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut outputs = Vec::with_capacity(query.projection.len());
        for item in &query.projection {
            match item {
                SelectItem::Wildcard => {
                    if aggregate {
                        return Err(QueryError::WildcardInAggregate);
                    }
                    outputs.extend(table.columns.iter().enumerate().map(|(idx, name)| OutputColumn {
                        label: name.clone(),
                        source: Source::Column(idx),
                    }));
                }
                SelectItem::Column { name, .. } => {
                    let idx = column_index(table, name)?;
                    if aggregate && !query.group_by.contains(name) {
                        return Err(QueryError::UngroupedColumn(name.clone()));
                    }
                    outputs.push(OutputColumn {
                        label: item.label(),
                        source: Source::Column(idx),
                    });
                }
                SelectItem::Aggregate { func, arg, .. } => {
                    let idx = arg.as_deref().map(|name| column_index(table, name)).transpose()?;
                    outputs.push(OutputColumn {
                        label: item.label(),
                        source: Source::Aggregate(*func, idx),
                    });
                }
            }
        }

        let mut labels = HashSet::with_capacity(outputs.len());
        if let Some(dup) = outputs.iter().find(|out| !labels.insert(out.label.as_str())) {
            return Err(QueryError::DuplicateColumn(dup.label.clone()));
        }

        let sort_key = match &query.order_by {
            None => None,
            Some(order) => Some(match outputs.iter().position(|out| out.label == order.column) {
                Some(i) => SortKey::Output(i),
                None => {
                    let idx = column_index(table, &order.column)?;
                    if aggregate && !query.group_by.contains(&order.column) {
                        return Err(QueryError::UngroupedColumn(order.column.clone()));
                    }
                    SortKey::Source(idx)
                }
            }),
        };

        Ok(Self {
            predicates,
            outputs,
            aggregate,
            group_keys,
            sort_key,
            sort_direction: query.order_by.as_ref().map(|o| o.direction),
        })
    }

    /// Splits the matching rows into groups in first-seen key order. A plain
    /// query puts every row in its own group; an aggregate with no GROUP BY
    /// yields exactly one group, possibly empty.
    fn group<'t>(&self, rows: Vec<&'t [Value]>) -> Vec<Vec<&'t [Value]>> {
        if !self.aggregate {
            return rows.into_iter().map(|row| vec![row]).collect();
        }
        if self.group_keys.is_empty() {
            return vec![rows];
        }

        let mut index: HashMap<Vec<GroupKey<'t>>, usize> = HashMap::new();
        let mut groups: Vec<Vec<&'t [Value]>> = Vec::new();
        for row in rows {
            let key: Vec<GroupKey<'t>> = self.group_keys.iter().map(|&idx| GroupKey::of(cell(row, idx))).collect();
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(row);
        }
        groups
    }
}
