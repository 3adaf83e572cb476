// Query parser - Lowers sqlparser's AST into the supported SELECT subset
use super::ast::{AggregateFunc, CompareOp, Operand, OrderBy, Predicate, SelectItem, SelectQuery, SortDirection};
use super::error::QueryError;
use crate::domain::dataset::Value;
use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, ObjectName,
    OrderByExpr, Query, Select, SelectItem as SqlSelectItem, SetExpr, Statement, TableFactor, UnaryOperator,
    Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt::Display;

/// Parses one SELECT statement of the form
///
/// ```text
/// SELECT item [, item]* FROM table
///   [WHERE predicate [AND predicate]*]
///   [GROUP BY column [, column]*]
///   [ORDER BY column [ASC|DESC]]
///   [LIMIT n] [;]
/// ```
///
/// Anything else sqlparser understands is rejected as unsupported.
pub fn parse(input: &str) -> Result<SelectQuery, QueryError> {
    if let Some(name) = leftover_placeholder(input) {
        return Err(QueryError::UnresolvedPlaceholder(name.to_string()));
    }

    let mut statements = Parser::parse_sql(&GenericDialect {}, input)?;
    if statements.len() != 1 {
        return Err(QueryError::Unsupported(format!(
            "{} statements, expected exactly one SELECT",
            statements.len()
        )));
    }
    match statements.remove(0) {
        Statement::Query(query) => lower_query(*query),
        other => Err(unsupported("statement", &other)),
    }
}

/// Name inside the first `${...}` the resolver left behind.
fn leftover_placeholder(input: &str) -> Option<&str> {
    let start = input.find("${")? + 2;
    let len = input[start..].find('}')?;
    Some(&input[start..start + len])
}

fn unsupported(what: &str, node: &impl Display) -> QueryError {
    QueryError::Unsupported(format!("{} `{}`", what, node))
}

fn lower_query(query: Query) -> Result<SelectQuery, QueryError> {
    if query.with.is_some() {
        return Err(QueryError::Unsupported("WITH".to_string()));
    }
    if query.offset.is_some() || query.fetch.is_some() {
        return Err(QueryError::Unsupported("OFFSET / FETCH".to_string()));
    }

    let order_by = match query.order_by {
        Some(order_by) => {
            let mut exprs = order_by.exprs;
            if exprs.len() != 1 {
                return Err(QueryError::Unsupported(format!(
                    "ORDER BY on {} columns, expected one",
                    exprs.len()
                )));
            }
            Some(lower_order_by(exprs.remove(0))?)
        }
        None => None,
    };
    let limit = query.limit.map(lower_limit).transpose()?;

    match *query.body {
        SetExpr::Select(select) => lower_select(*select, order_by, limit),
        other => Err(unsupported("query body", &other)),
    }
}

fn lower_select(select: Select, order_by: Option<OrderBy>, limit: Option<usize>) -> Result<SelectQuery, QueryError> {
    if select.distinct.is_some() {
        return Err(QueryError::Unsupported("DISTINCT".to_string()));
    }
    if select.top.is_some() || select.into.is_some() {
        return Err(QueryError::Unsupported("TOP / INTO".to_string()));
    }
    if let Some(having) = &select.having {
        return Err(unsupported("HAVING", having));
    }
    if select.projection.is_empty() {
        return Err(QueryError::Syntax("SELECT needs at least one column".to_string()));
    }

    let table = match select.from.as_slice() {
        [from] if from.joins.is_empty() => match &from.relation {
            TableFactor::Table { name, args: None, .. } => object_name(name)?,
            other => return Err(unsupported("table", other)),
        },
        [] => return Err(QueryError::Syntax("missing FROM clause".to_string())),
        _ => return Err(QueryError::Unsupported("joins or multiple tables".to_string())),
    };

    let projection = select
        .projection
        .into_iter()
        .map(lower_select_item)
        .collect::<Result<Vec<_>, _>>()?;

    let mut selection = Vec::new();
    if let Some(expr) = select.selection {
        conjunction(expr, &mut selection)?;
    }

    let group_by = match select.group_by {
        GroupByExpr::Expressions(exprs, modifiers) if modifiers.is_empty() => {
            exprs.into_iter().map(column).collect::<Result<Vec<_>, _>>()?
        }
        other => return Err(unsupported("GROUP BY", &other)),
    };

    Ok(SelectQuery {
        projection,
        table,
        selection,
        group_by,
        order_by,
        limit,
    })
}

fn object_name(name: &ObjectName) -> Result<String, QueryError> {
    match name.0.as_slice() {
        [ident] => Ok(ident.value.clone()),
        _ => Err(unsupported("qualified name", name)),
    }
}

fn column(expr: Expr) -> Result<String, QueryError> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value),
        other => Err(unsupported("column reference", &other)),
    }
}

fn lower_select_item(item: SqlSelectItem) -> Result<SelectItem, QueryError> {
    match item {
        SqlSelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
        SqlSelectItem::UnnamedExpr(expr) => projected(expr, None),
        SqlSelectItem::ExprWithAlias { expr, alias } => projected(expr, Some(alias.value)),
        other => Err(unsupported("select item", &other)),
    }
}

fn projected(expr: Expr, alias: Option<String>) -> Result<SelectItem, QueryError> {
    match expr {
        Expr::Identifier(ident) => Ok(SelectItem::Column {
            name: ident.value,
            alias,
        }),
        Expr::Function(function) => {
            let (func, arg) = aggregate_call(function)?;
            Ok(SelectItem::Aggregate { func, arg, alias })
        }
        other => Err(unsupported("select expression", &other)),
    }
}

/// `COUNT()`, `COUNT(*)` or `FUNC(column)`. The argument is `None` only for COUNT.
fn aggregate_call(function: Function) -> Result<(AggregateFunc, Option<String>), QueryError> {
    let name = function.name.to_string();
    let func = AggregateFunc::from_name(&name).ok_or_else(|| QueryError::UnknownFunction(name.clone()))?;
    if function.over.is_some() || function.filter.is_some() {
        return Err(QueryError::Unsupported(format!("window or FILTER clause on {}", name)));
    }

    let args = match function.args {
        FunctionArguments::List(list) if list.duplicate_treatment.is_none() && list.clauses.is_empty() => list.args,
        _ => return Err(QueryError::Unsupported(format!("arguments to {}", name))),
    };
    let arg = match args.as_slice() {
        [] | [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)] => None,
        [FunctionArg::Unnamed(FunctionArgExpr::Expr(Expr::Identifier(ident)))] => Some(ident.value.clone()),
        _ => return Err(QueryError::Unsupported(format!("arguments to {}", name))),
    };

    if arg.is_none() && func != AggregateFunc::Count {
        return Err(QueryError::MissingArgument {
            function: func.name().to_string(),
        });
    }
    Ok((func, arg))
}

/// Flattens `a AND b AND ...` into a list of predicates.
fn conjunction(expr: Expr, predicates: &mut Vec<Predicate>) -> Result<(), QueryError> {
    match expr {
        Expr::Nested(inner) => conjunction(*inner, predicates),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            conjunction(*left, predicates)?;
            conjunction(*right, predicates)
        }
        Expr::BinaryOp { left, op, right } => {
            let Some(cmp) = compare_op(&op) else {
                return Err(unsupported("operator", &op));
            };
            predicates.push(Predicate::Compare {
                left: operand(*left)?,
                op: cmp,
                right: operand(*right)?,
            });
            Ok(())
        }
        Expr::Between {
            expr,
            negated: false,
            low,
            high,
        } => {
            let column = match *expr {
                Expr::Identifier(ident) => ident.value,
                other => {
                    return Err(QueryError::Syntax(format!(
                        "BETWEEN needs a column on the left, found {}",
                        other
                    )));
                }
            };
            predicates.push(Predicate::Between {
                column,
                low: operand(*low)?,
                high: operand(*high)?,
            });
            Ok(())
        }
        other => Err(unsupported("predicate", &other)),
    }
}

fn compare_op(op: &BinaryOperator) -> Option<CompareOp> {
    Some(match op {
        BinaryOperator::Eq => CompareOp::Eq,
        BinaryOperator::NotEq => CompareOp::Ne,
        BinaryOperator::Lt => CompareOp::Lt,
        BinaryOperator::LtEq => CompareOp::Le,
        BinaryOperator::Gt => CompareOp::Gt,
        BinaryOperator::GtEq => CompareOp::Ge,
        _ => return None,
    })
}

fn operand(expr: Expr) -> Result<Operand, QueryError> {
    match expr {
        Expr::Identifier(ident) => Ok(Operand::Column(ident.value)),
        Expr::Nested(inner) => operand(*inner),
        Expr::Value(value) => literal(value).map(Operand::Literal),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match *expr {
            Expr::Value(SqlValue::Number(text, _)) => number(&text).map(|n| Operand::Literal(Value::Number(-n))),
            other => Err(unsupported("negated operand", &other)),
        },
        other => Err(unsupported("operand", &other)),
    }
}

fn literal(value: SqlValue) -> Result<Value, QueryError> {
    match value {
        SqlValue::Number(text, _) => number(&text).map(Value::Number),
        SqlValue::SingleQuotedString(text) => Ok(Value::Text(text)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(unsupported("literal", &other)),
    }
}

fn number(text: &str) -> Result<f64, QueryError> {
    text.parse()
        .map_err(|_| QueryError::Syntax(format!("invalid number {}", text)))
}

fn lower_order_by(order: OrderByExpr) -> Result<OrderBy, QueryError> {
    if order.nulls_first.is_some() {
        return Err(QueryError::Unsupported("NULLS FIRST / NULLS LAST".to_string()));
    }
    let direction = match order.asc {
        Some(false) => SortDirection::Desc,
        _ => SortDirection::Asc,
    };
    Ok(OrderBy {
        column: column(order.expr)?,
        direction,
    })
}

fn lower_limit(expr: Expr) -> Result<usize, QueryError> {
    let invalid = || QueryError::Syntax(format!("LIMIT expects a non-negative integer, found {}", expr));
    match &expr {
        Expr::Value(SqlValue::Number(text, _)) => text.parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_query() {
        let query = parse(
            "SELECT blob4 AS country, COUNT() AS visits, SUM(double1) FROM analytics \
             WHERE date BETWEEN '2024-12-19' AND '2024-12-22' AND double1 > 100 \
             GROUP BY blob4 ORDER BY visits DESC LIMIT 5;",
        )
        .unwrap();

        assert_eq!(query.table, "analytics");
        assert_eq!(
            query.projection,
            vec![
                SelectItem::Column {
                    name: "blob4".to_string(),
                    alias: Some("country".to_string()),
                },
                SelectItem::Aggregate {
                    func: AggregateFunc::Count,
                    arg: None,
                    alias: Some("visits".to_string()),
                },
                SelectItem::Aggregate {
                    func: AggregateFunc::Sum,
                    arg: Some("double1".to_string()),
                    alias: None,
                },
            ]
        );
        assert_eq!(
            query.selection,
            vec![
                Predicate::Between {
                    column: "date".to_string(),
                    low: Operand::Literal(Value::text("2024-12-19")),
                    high: Operand::Literal(Value::text("2024-12-22")),
                },
                Predicate::Compare {
                    left: Operand::Column("double1".to_string()),
                    op: CompareOp::Gt,
                    right: Operand::Literal(Value::Number(100.0)),
                },
            ]
        );
        assert_eq!(query.group_by, vec!["blob4".to_string()]);
        assert_eq!(
            query.order_by,
            Some(OrderBy {
                column: "visits".to_string(),
                direction: SortDirection::Desc,
            })
        );
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn test_parse_bare_alias_and_count_star() {
        let query = parse("select count(*) total from t").unwrap();
        assert_eq!(
            query.projection,
            vec![SelectItem::Aggregate {
                func: AggregateFunc::Count,
                arg: None,
                alias: Some("total".to_string()),
            }]
        );
        assert!(query.is_aggregate());
    }

    #[test]
    fn test_parse_number_literals() {
        let query = parse("SELECT a FROM t WHERE a > 1e3 AND a <= 2.5E2 AND a <> -3").unwrap();
        let literals: Vec<Operand> = query
            .selection
            .into_iter()
            .map(|p| match p {
                Predicate::Compare { right, .. } => right,
                other => panic!("expected comparison, got {:?}", other),
            })
            .collect();
        assert_eq!(
            literals,
            vec![
                Operand::Literal(Value::Number(1000.0)),
                Operand::Literal(Value::Number(250.0)),
                Operand::Literal(Value::Number(-3.0)),
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("SELECT FROM t"), Err(QueryError::Syntax(_))));
        assert!(matches!(parse("SELECT a FROM"), Err(QueryError::Syntax(_))));
        assert!(matches!(parse("SELECT a FROM t WHERE a = 1 extra"), Err(QueryError::Syntax(_))));
        assert!(matches!(parse("SELECT a FROM t WHERE a"), Err(QueryError::Unsupported(_))));
        assert_eq!(
            parse("SELECT MEDIAN(a) FROM t"),
            Err(QueryError::UnknownFunction("MEDIAN".to_string()))
        );
        assert_eq!(
            parse("SELECT SUM() FROM t"),
            Err(QueryError::MissingArgument {
                function: "SUM".to_string()
            })
        );
        assert!(matches!(parse("SELECT a FROM t LIMIT -1"), Err(QueryError::Syntax(_))));
        assert!(matches!(parse("SELECT a FROM t LIMIT 2.5"), Err(QueryError::Syntax(_))));
        assert!(matches!(
            parse("SELECT a FROM t WHERE 'x' BETWEEN 1 AND 2"),
            Err(QueryError::Syntax(ref message)) if message.starts_with("BETWEEN needs a column")
        ));
    }

    #[test]
    fn test_constructs_outside_the_grammar_are_rejected() {
        for sql in [
            "SELECT a FROM t WHERE a = 1 OR a = 2",
            "SELECT DISTINCT a FROM t",
            "SELECT a FROM t JOIN u ON t.a = u.a",
            "SELECT a, COUNT() FROM t GROUP BY a HAVING COUNT() > 1",
            "SELECT a FROM t ORDER BY a, b",
            "SELECT a + 1 FROM t",
            "SELECT a FROM t WHERE a NOT BETWEEN 1 AND 2",
            "DELETE FROM t",
            "SELECT a FROM t; SELECT b FROM t",
        ] {
            assert!(matches!(parse(sql), Err(QueryError::Unsupported(_))), "{}", sql);
        }
    }

    #[test]
    fn test_leftover_placeholder_is_named() {
        assert_eq!(
            parse("SELECT * FROM t WHERE blob4 = ${country}"),
            Err(QueryError::UnresolvedPlaceholder("country".to_string()))
        );
    }

    #[test]
    fn test_order_by_defaults_to_ascending() {
        let query = parse("SELECT date FROM analytics ORDER BY date").unwrap();
        assert_eq!(query.order_by.unwrap().direction, SortDirection::Asc);
    }
}
